//! Dobles en memoria del backend para los tests de controladores

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Mutex;

use crate::clients::transport_api_client::TransportApi;
use crate::models::attendance::{AttendanceFilters, AttendanceRecord, MarkAttendanceRequest};
use crate::models::location::LatLng;
use crate::models::passenger::Student;
use crate::models::route::{CreateRouteRequest, Route, UpdateRouteRequest};
use crate::models::staff::{StaffMember, StaffRole, Vehicle};
use crate::models::stop::{CreateStopRequest, Stop, UpdateStopRequest};
use crate::services::road_path_service::RoadPathResolver;
use crate::utils::errors::{not_found_error, AppError, AppResult};

#[derive(Default)]
struct Backend {
    routes: Vec<Route>,
    stops: Vec<Stop>,
    students: Vec<Student>,
    attendance: Vec<AttendanceRecord>,
    created_stops: Vec<CreateStopRequest>,
    marks: Vec<MarkAttendanceRequest>,
    next_id: i64,
    fail_next: Option<(StatusCode, Option<String>)>,
    fail_attendance_list: bool,
    omit_entities: bool,
}

pub struct FakeTransportApi {
    backend: Mutex<Backend>,
}

fn route(id: i64, name: &str) -> Route {
    Route {
        id,
        route_name: name.to_string(),
        bus_number: Some("TS-09-1234".to_string()),
        vehicle_id: Some(1),
        driver_id: Some(7),
        conductor_id: None,
        driver_name: Some("Ravi".to_string()),
        conductor_name: None,
    }
}

fn stop(id: i64, name: &str, lat: f64, lng: f64, order: i32) -> Stop {
    Stop {
        id,
        route_id: 1,
        stop_name: name.to_string(),
        stop_lat: lat,
        stop_lng: lng,
        stop_order: order,
    }
}

fn student(id: i64, name: &str, stop_id: Option<i64>) -> Student {
    Student {
        id,
        name: name.to_string(),
        class_name: Some("5A".to_string()),
        roll_number: Some(format!("R{}", id)),
        route_id: stop_id.map(|_| 1),
        stop_id,
    }
}

impl FakeTransportApi {
    /// Ruta 1 con paradas 10, 11 y 12 (devueltas desordenadas) y tres estudiantes
    pub fn with_route_and_stops() -> Self {
        let backend = Backend {
            routes: vec![route(1, "North Loop")],
            stops: vec![
                stop(12, "C", 2.0, 2.0, 3),
                stop(10, "A", 0.0, 0.0, 1),
                stop(11, "B", 1.0, 1.0, 2),
            ],
            students: vec![
                student(100, "Asha", Some(10)),
                student(101, "Bilal", None),
                student(102, "Chen", Some(11)),
            ],
            next_id: 1000,
            ..Default::default()
        };
        Self {
            backend: Mutex::new(backend),
        }
    }

    pub fn fail_next(&self, status: StatusCode, message: Option<&str>) {
        self.lock().fail_next = Some((status, message.map(str::to_string)));
    }

    pub fn fail_attendance_list(&self, fail: bool) {
        self.lock().fail_attendance_list = fail;
    }

    /// Las escrituras responden sin entidad (`{}`)
    pub fn set_return_entities(&self, enabled: bool) {
        self.lock().omit_entities = !enabled;
    }

    pub fn set_attendance(&self, records: Vec<AttendanceRecord>) {
        self.lock().attendance = records;
    }

    pub fn created_stops(&self) -> Vec<CreateStopRequest> {
        self.lock().created_stops.clone()
    }

    pub fn marks(&self) -> Vec<MarkAttendanceRequest> {
        self.lock().marks.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    fn begin(&self) -> AppResult<std::sync::MutexGuard<'_, Backend>> {
        let mut backend = self.lock();
        match backend.fail_next.take() {
            Some((status, message)) => Err(AppError::Api { status, message }),
            None => Ok(backend),
        }
    }
}

#[async_trait]
impl TransportApi for FakeTransportApi {
    async fn list_routes(&self) -> AppResult<Vec<Route>> {
        Ok(self.begin()?.routes.clone())
    }

    async fn create_route(&self, request: &CreateRouteRequest) -> AppResult<Option<Route>> {
        let mut backend = self.begin()?;
        backend.next_id += 1;
        let mut created = route(backend.next_id, &request.route_name);
        created.vehicle_id = request.vehicle_id;
        created.driver_id = request.driver_id;
        created.conductor_id = request.conductor_id;
        backend.routes.push(created.clone());
        Ok((!backend.omit_entities).then_some(created))
    }

    async fn update_route(&self, route_id: i64, request: &UpdateRouteRequest) -> AppResult<Option<Route>> {
        let mut backend = self.begin()?;
        let omit = backend.omit_entities;
        let route = backend
            .routes
            .iter_mut()
            .find(|r| r.id == route_id)
            .ok_or_else(|| not_found_error("Route", &route_id.to_string()))?;
        route.route_name = request.route_name.clone();
        route.vehicle_id = request.vehicle_id;
        route.driver_id = request.driver_id;
        route.conductor_id = request.conductor_id;
        Ok((!omit).then(|| route.clone()))
    }

    async fn delete_route(&self, route_id: i64) -> AppResult<()> {
        self.begin()?.routes.retain(|r| r.id != route_id);
        Ok(())
    }

    async fn list_stops(&self, route_id: i64) -> AppResult<Vec<Stop>> {
        let backend = self.begin()?;
        Ok(backend.stops.iter().filter(|s| s.route_id == route_id).cloned().collect())
    }

    async fn create_stop(&self, request: &CreateStopRequest) -> AppResult<Option<Stop>> {
        let mut backend = self.begin()?;
        backend.next_id += 1;
        let created = Stop {
            id: backend.next_id,
            route_id: request.route_id,
            stop_name: request.stop_name.clone(),
            stop_lat: request.stop_lat,
            stop_lng: request.stop_lng,
            stop_order: request.stop_order,
        };
        backend.stops.push(created.clone());
        backend.created_stops.push(request.clone());
        Ok((!backend.omit_entities).then_some(created))
    }

    async fn update_stop(&self, stop_id: i64, request: &UpdateStopRequest) -> AppResult<Option<Stop>> {
        let mut backend = self.begin()?;
        let omit = backend.omit_entities;
        let stop = backend
            .stops
            .iter_mut()
            .find(|s| s.id == stop_id)
            .ok_or_else(|| not_found_error("Stop", &stop_id.to_string()))?;
        stop.stop_name = request.stop_name.clone();
        stop.stop_lat = request.stop_lat;
        stop.stop_lng = request.stop_lng;
        Ok((!omit).then(|| stop.clone()))
    }

    async fn delete_stop(&self, stop_id: i64) -> AppResult<()> {
        self.begin()?.stops.retain(|s| s.id != stop_id);
        Ok(())
    }

    async fn list_students(&self) -> AppResult<Vec<Student>> {
        Ok(self.begin()?.students.clone())
    }

    async fn list_route_students(&self, route_id: i64) -> AppResult<Vec<Student>> {
        let backend = self.begin()?;
        Ok(backend
            .students
            .iter()
            .filter(|s| s.route_id == Some(route_id))
            .cloned()
            .collect())
    }

    async fn assign_student_stop(&self, student_id: i64, stop_id: Option<i64>) -> AppResult<Option<Student>> {
        let mut backend = self.begin()?;
        let omit = backend.omit_entities;
        let student = backend
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| not_found_error("Student", &student_id.to_string()))?;
        student.stop_id = stop_id;
        student.route_id = stop_id.map(|_| 1);
        Ok((!omit).then(|| student.clone()))
    }

    async fn mark_attendance(&self, request: &MarkAttendanceRequest) -> AppResult<Option<AttendanceRecord>> {
        let mut backend = self.begin()?;
        backend.marks.push(request.clone());
        let record = AttendanceRecord {
            id: Some(backend.marks.len() as i64),
            student_id: request.student_id,
            stop_id: Some(request.stop_id),
            route_id: Some(request.route_id),
            status: request.status,
            date: Some(request.date),
        };
        backend.attendance.retain(|r| r.student_id != request.student_id);
        backend.attendance.push(record.clone());
        Ok((!backend.omit_entities).then_some(record))
    }

    async fn list_attendance(&self, filters: &AttendanceFilters) -> AppResult<Vec<AttendanceRecord>> {
        let backend = self.begin()?;
        if backend.fail_attendance_list {
            return Err(AppError::Api {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: None,
            });
        }
        Ok(backend
            .attendance
            .iter()
            .filter(|r| r.stop_id.map_or(true, |s| s == filters.stop_id))
            .cloned()
            .collect())
    }

    async fn driver_route(&self) -> AppResult<Route> {
        let backend = self.begin()?;
        backend
            .routes
            .first()
            .cloned()
            .ok_or_else(|| not_found_error("Route", "driver"))
    }

    async fn rider_route(&self) -> AppResult<Route> {
        self.driver_route().await
    }

    async fn list_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        self.begin()?;
        Ok(vec![Vehicle {
            id: 1,
            bus_number: "TS-09-1234".to_string(),
            capacity: Some(40),
        }])
    }

    async fn list_staff(&self, role: StaffRole) -> AppResult<Vec<StaffMember>> {
        self.begin()?;
        let name = match role {
            StaffRole::Driver => "Ravi",
            StaffRole::Conductor => "Meena",
        };
        Ok(vec![StaffMember {
            id: 7,
            name: name.to_string(),
            phone: None,
        }])
    }
}

/// Trazado fijo, sin red
pub struct FakeRoadPath {
    path: Vec<LatLng>,
}

impl FakeRoadPath {
    pub fn new(path: Vec<LatLng>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl RoadPathResolver for FakeRoadPath {
    async fn get_road_path(&self, stops: &[Stop]) -> Vec<LatLng> {
        if stops.len() < 2 {
            return Vec::new();
        }
        self.path.clone()
    }
}
