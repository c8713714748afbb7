//! Editor de rutas y paradas (administrador)
//!
//! Tres pantallas: lista de rutas → mapa de la ruta (tocar para añadir) →
//! modal de parada (pestañas de detalles y pasajeros). Cada llamada fallida
//! deja el estado como estaba y registra una alerta.

use std::sync::Arc;
use validator::Validate;

use crate::clients::transport_api_client::TransportApi;
use crate::controllers::Alert;
use crate::models::location::LatLng;
use crate::models::passenger::Student;
use crate::models::route::{CreateRouteRequest, Route, UpdateRouteRequest};
use crate::models::staff::{RouteFormOptions, StaffRole};
use crate::models::stop::{sort_by_order, CreateStopRequest, Stop, UpdateStopRequest};
use crate::services::road_path_service::RoadPathResolver;
use crate::utils::errors::{invalid_state_error, not_found_error, validation_error, AppError, AppResult};
use crate::utils::validation::{normalize_name, validate_coordinates};

#[derive(Debug, Clone, PartialEq)]
pub enum EditorScreen {
    RouteList,
    RouteMap {
        route_id: i64,
    },
    StopDetail {
        route_id: i64,
        mode: StopDetailMode,
        tab: StopDetailTab,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopDetailMode {
    /// Parada nueva en la coordenada tocada
    New { candidate: LatLng },
    Edit { stop_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDetailTab {
    Details,
    Passengers,
}

/// Borrado pendiente de confirmación
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRouteDeletion {
    pub route_id: i64,
    pub route_name: String,
}

impl PendingRouteDeletion {
    pub fn prompt(&self) -> String {
        format!("Delete route '{}'? This cannot be undone.", self.route_name)
    }
}

/// Fila de la pestaña de pasajeros
#[derive(Debug, Clone, PartialEq)]
pub struct PassengerRow {
    pub student: Student,
    pub assigned_here: bool,
}

pub struct RouteEditorController {
    api: Arc<dyn TransportApi>,
    roads: Arc<dyn RoadPathResolver>,
    screen: EditorScreen,
    routes: Vec<Route>,
    stops: Vec<Stop>,
    road_path: Vec<LatLng>,
    students: Vec<Student>,
    form_options: RouteFormOptions,
    stop_name_draft: String,
    alert: Option<Alert>,
}

impl RouteEditorController {
    pub fn new(api: Arc<dyn TransportApi>, roads: Arc<dyn RoadPathResolver>) -> Self {
        Self {
            api,
            roads,
            screen: EditorScreen::RouteList,
            routes: Vec::new(),
            stops: Vec::new(),
            road_path: Vec::new(),
            students: Vec::new(),
            form_options: RouteFormOptions::default(),
            stop_name_draft: String::new(),
            alert: None,
        }
    }

    pub fn screen(&self) -> &EditorScreen {
        &self.screen
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn road_path(&self) -> &[LatLng] {
        &self.road_path
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn form_options(&self) -> &RouteFormOptions {
        &self.form_options
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    /// Descartar la alerta mostrada
    pub fn take_alert(&mut self) -> Option<Alert> {
        self.alert.take()
    }

    pub fn stop_name_draft(&self) -> &str {
        &self.stop_name_draft
    }

    pub fn set_stop_name_draft(&mut self, name: impl Into<String>) {
        self.stop_name_draft = name.into();
    }

    pub fn open_route_id(&self) -> Option<i64> {
        match &self.screen {
            EditorScreen::RouteList => None,
            EditorScreen::RouteMap { route_id } | EditorScreen::StopDetail { route_id, .. } => Some(*route_id),
        }
    }

    /// Parada abierta en modo edición
    pub fn open_stop(&self) -> Option<&Stop> {
        match &self.screen {
            EditorScreen::StopDetail {
                mode: StopDetailMode::Edit { stop_id },
                ..
            } => self.stops.iter().find(|s| s.id == *stop_id),
            _ => None,
        }
    }

    fn surface<T>(&mut self, result: AppResult<T>) -> AppResult<T> {
        if let Err(e) = &result {
            log::warn!("❌ Editor de rutas: {}", e);
            self.alert = Some(Alert::error(e));
        }
        result
    }

    // ----- Rutas -----

    pub async fn load_routes(&mut self) -> AppResult<()> {
        let result = self.api.list_routes().await;
        self.routes = self.surface(result)?;
        log::info!("🚌 {} rutas cargadas", self.routes.len());
        Ok(())
    }

    /// Vehículos, conductores y ayudantes para el formulario de ruta
    pub async fn load_route_form_options(&mut self) -> AppResult<()> {
        let result = futures::try_join!(
            self.api.list_vehicles(),
            self.api.list_staff(StaffRole::Driver),
            self.api.list_staff(StaffRole::Conductor),
        );
        let (vehicles, drivers, conductors) = self.surface(result)?;
        self.form_options = RouteFormOptions {
            vehicles,
            drivers,
            conductors,
        };
        Ok(())
    }

    pub async fn create_route(&mut self, mut request: CreateRouteRequest) -> AppResult<()> {
        request.route_name = normalize_name(&request.route_name);
        let validated = request.validate().map_err(AppError::from);
        self.surface(validated)?;

        let result = self.api.create_route(&request).await;
        self.surface(result)?;
        self.load_routes().await
    }

    pub async fn update_route(&mut self, route_id: i64, mut request: UpdateRouteRequest) -> AppResult<()> {
        request.route_name = normalize_name(&request.route_name);
        let validated = request.validate().map_err(AppError::from);
        self.surface(validated)?;

        let result = self.api.update_route(route_id, &request).await;
        match self.surface(result)? {
            Some(updated) => {
                if let Some(route) = self.routes.iter_mut().find(|r| r.id == route_id) {
                    *route = updated;
                }
                Ok(())
            }
            None => self.load_routes().await,
        }
    }

    /// Primer paso del borrado: pide confirmación
    pub fn request_route_deletion(&mut self, route_id: i64) -> AppResult<PendingRouteDeletion> {
        let pending = self
            .routes
            .iter()
            .find(|r| r.id == route_id)
            .map(|r| PendingRouteDeletion {
                route_id,
                route_name: r.route_name.clone(),
            })
            .ok_or_else(|| not_found_error("Route", &route_id.to_string()));
        self.surface(pending)
    }

    pub async fn confirm_route_deletion(&mut self, pending: PendingRouteDeletion) -> AppResult<()> {
        let result = self.api.delete_route(pending.route_id).await;
        self.surface(result)?;

        self.routes.retain(|r| r.id != pending.route_id);
        if self.open_route_id() == Some(pending.route_id) {
            self.back_to_list();
        }
        Ok(())
    }

    // ----- Mapa de la ruta -----

    /// Abrir el mapa de una ruta: paradas y trazado por carretera
    pub async fn open_route(&mut self, route_id: i64) -> AppResult<()> {
        let result = self.api.list_stops(route_id).await;
        let mut stops = self.surface(result)?;
        sort_by_order(&mut stops);

        self.road_path = self.roads.get_road_path(&stops).await;
        self.stops = stops;
        self.screen = EditorScreen::RouteMap { route_id };
        log::info!(
            "🗺️ Ruta {} abierta: {} paradas, {} puntos de trazado",
            route_id,
            self.stops.len(),
            self.road_path.len()
        );
        Ok(())
    }

    async fn refresh_stops(&mut self, route_id: i64) -> AppResult<()> {
        let result = self.api.list_stops(route_id).await;
        let mut stops = self.surface(result)?;
        sort_by_order(&mut stops);
        self.road_path = self.roads.get_road_path(&stops).await;
        self.stops = stops;
        Ok(())
    }

    /// Tocar el mapa con una ruta abierta prepara una parada nueva
    pub fn map_tap(&mut self, coordinate: LatLng) -> AppResult<()> {
        let route_id = match &self.screen {
            EditorScreen::RouteMap { route_id } => *route_id,
            _ => return Err(invalid_state_error("Open a route before adding stops")),
        };
        let checked = validate_coordinates(coordinate.latitude, coordinate.longitude)
            .map_err(|_| validation_error("coordinate", "Coordinates out of range"));
        self.surface(checked)?;

        self.stop_name_draft.clear();
        self.screen = EditorScreen::StopDetail {
            route_id,
            mode: StopDetailMode::New { candidate: coordinate },
            tab: StopDetailTab::Details,
        };
        Ok(())
    }

    /// Tocar un marcador abre la parada en modo edición
    pub fn marker_tap(&mut self, stop_id: i64) -> AppResult<()> {
        let route_id = self
            .open_route_id()
            .ok_or_else(|| invalid_state_error("No route is open"))?;
        let stop = self
            .stops
            .iter()
            .find(|s| s.id == stop_id)
            .ok_or_else(|| not_found_error("Stop", &stop_id.to_string()))?;

        self.stop_name_draft = stop.stop_name.clone();
        self.screen = EditorScreen::StopDetail {
            route_id,
            mode: StopDetailMode::Edit { stop_id },
            tab: StopDetailTab::Details,
        };
        Ok(())
    }

    /// Guardar la parada del modal con el nombre del borrador
    ///
    /// Las paradas nuevas se añaden al final: orden = número de paradas + 1.
    pub async fn save_stop(&mut self) -> AppResult<()> {
        let (route_id, mode) = match &self.screen {
            EditorScreen::StopDetail { route_id, mode, .. } => (*route_id, mode.clone()),
            _ => return Err(invalid_state_error("No stop is open")),
        };
        let stop_name = normalize_name(&self.stop_name_draft);

        match mode {
            StopDetailMode::New { candidate } => {
                let request = CreateStopRequest {
                    route_id,
                    stop_name,
                    stop_lat: candidate.latitude,
                    stop_lng: candidate.longitude,
                    stop_order: self.stops.len() as i32 + 1,
                };
                let validated = request.validate().map_err(AppError::from);
                self.surface(validated)?;

                let result = self.api.create_stop(&request).await;
                self.surface(result)?;
            }
            StopDetailMode::Edit { stop_id } => {
                let stop = self
                    .stops
                    .iter()
                    .find(|s| s.id == stop_id)
                    .ok_or_else(|| not_found_error("Stop", &stop_id.to_string()))?;
                let request = UpdateStopRequest {
                    stop_name,
                    stop_lat: stop.stop_lat,
                    stop_lng: stop.stop_lng,
                };
                let validated = request.validate().map_err(AppError::from);
                self.surface(validated)?;

                let result = self.api.update_stop(stop_id, &request).await;
                self.surface(result)?;
            }
        }

        self.refresh_stops(route_id).await?;
        self.close_modal();
        Ok(())
    }

    pub async fn delete_stop(&mut self) -> AppResult<()> {
        let (route_id, stop_id) = match &self.screen {
            EditorScreen::StopDetail {
                route_id,
                mode: StopDetailMode::Edit { stop_id },
                ..
            } => (*route_id, *stop_id),
            _ => return Err(invalid_state_error("Only saved stops can be deleted")),
        };

        let result = self.api.delete_stop(stop_id).await;
        self.surface(result)?;

        self.refresh_stops(route_id).await?;
        self.close_modal();
        Ok(())
    }

    // ----- Pasajeros -----

    pub async fn select_tab(&mut self, tab: StopDetailTab) -> AppResult<()> {
        let is_edit = match &self.screen {
            EditorScreen::StopDetail { mode, .. } => matches!(mode, StopDetailMode::Edit { .. }),
            _ => return Err(invalid_state_error("No stop is open")),
        };
        if tab == StopDetailTab::Passengers {
            if !is_edit {
                return Err(invalid_state_error("Save the stop before assigning passengers"));
            }
            self.load_students().await?;
        }
        if let EditorScreen::StopDetail { tab: current, .. } = &mut self.screen {
            *current = tab;
        }
        Ok(())
    }

    pub async fn load_students(&mut self) -> AppResult<()> {
        let result = self.api.list_students().await;
        self.students = self.surface(result)?;
        Ok(())
    }

    /// Estudiantes visibles para la parada abierta
    ///
    /// Se ocultan los asignados a otra parada; los libres y los de esta
    /// parada aparecen con su interruptor.
    pub fn passenger_rows(&self) -> Vec<PassengerRow> {
        let Some(stop) = self.open_stop() else {
            return Vec::new();
        };
        self.students
            .iter()
            .filter(|s| !s.is_assigned_elsewhere(stop.id))
            .map(|s| PassengerRow {
                student: s.clone(),
                assigned_here: s.is_assigned_to(stop.id),
            })
            .collect()
    }

    /// Asignar o quitar un estudiante de la parada abierta
    ///
    /// Cada interruptor es una llamada independiente. Si el backend devuelve
    /// el estudiante actualizado se usa ese estado; si no, el optimista.
    pub async fn toggle_assignment(&mut self, student_id: i64, assign: bool) -> AppResult<()> {
        let stop_id = self
            .open_stop()
            .map(|s| s.id)
            .ok_or_else(|| invalid_state_error("No saved stop is open"))?;
        let target = if assign { Some(stop_id) } else { None };

        let result = self.api.assign_student_stop(student_id, target).await;
        let updated = self.surface(result)?;

        if let Some(student) = self.students.iter_mut().find(|s| s.id == student_id) {
            match updated {
                Some(server_state) => *student = server_state,
                None => student.stop_id = target,
            }
        }
        log::info!(
            "👧 Estudiante {} {} parada {}",
            student_id,
            if assign { "asignado a" } else { "quitado de" },
            stop_id
        );
        Ok(())
    }

    // ----- Navegación -----

    pub fn close_modal(&mut self) {
        if let Some(route_id) = self.open_route_id() {
            self.screen = EditorScreen::RouteMap { route_id };
        }
        self.stop_name_draft.clear();
    }

    pub fn back_to_list(&mut self) {
        self.screen = EditorScreen::RouteList;
        self.stops.clear();
        self.road_path.clear();
        self.students.clear();
        self.stop_name_draft.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRoadPath, FakeTransportApi};
    use reqwest::StatusCode;

    fn controller(api: &Arc<FakeTransportApi>, path: Vec<LatLng>) -> RouteEditorController {
        RouteEditorController::new(api.clone(), Arc::new(FakeRoadPath::new(path)))
    }

    #[tokio::test]
    async fn test_open_route_sorts_stops_and_resolves_path() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let path = vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)];
        let mut editor = controller(&api, path.clone());

        editor.load_routes().await.unwrap();
        editor.open_route(1).await.unwrap();

        assert_eq!(editor.screen(), &EditorScreen::RouteMap { route_id: 1 });
        let orders: Vec<i32> = editor.stops().iter().map(|s| s.stop_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(editor.road_path(), path.as_slice());
    }

    #[tokio::test]
    async fn test_map_tap_then_save_appends_stop() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.open_route(1).await.unwrap();

        editor.map_tap(LatLng::new(3.0, 3.0)).unwrap();
        assert!(matches!(
            editor.screen(),
            EditorScreen::StopDetail { mode: StopDetailMode::New { .. }, tab: StopDetailTab::Details, .. }
        ));

        editor.set_stop_name_draft("  Library Corner ");
        editor.save_stop().await.unwrap();

        let created = api.created_stops();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].stop_order, 4);
        assert_eq!(created[0].stop_name, "Library Corner");
        assert_eq!(editor.stops().len(), 4);
        assert_eq!(editor.screen(), &EditorScreen::RouteMap { route_id: 1 });
    }

    #[tokio::test]
    async fn test_map_tap_out_of_range_alerts() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.open_route(1).await.unwrap();

        assert!(editor.map_tap(LatLng::new(95.0, 3.0)).is_err());
        assert!(editor.take_alert().is_some());
        assert_eq!(editor.screen(), &EditorScreen::RouteMap { route_id: 1 });
    }

    #[tokio::test]
    async fn test_map_tap_requires_open_route() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        assert!(editor.map_tap(LatLng::new(3.0, 3.0)).is_err());
    }

    #[tokio::test]
    async fn test_blank_stop_name_is_rejected_before_api_call() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.open_route(1).await.unwrap();
        editor.map_tap(LatLng::new(3.0, 3.0)).unwrap();

        editor.set_stop_name_draft("   ");
        assert!(editor.save_stop().await.is_err());
        assert!(api.created_stops().is_empty());
        assert!(editor.alert().is_some());
    }

    #[tokio::test]
    async fn test_marker_tap_rename_and_delete() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.open_route(1).await.unwrap();

        editor.marker_tap(11).unwrap();
        assert_eq!(editor.stop_name_draft(), "B");
        editor.set_stop_name_draft("Bakery");
        editor.save_stop().await.unwrap();
        assert_eq!(editor.stops().iter().find(|s| s.id == 11).unwrap().stop_name, "Bakery");

        editor.marker_tap(11).unwrap();
        editor.delete_stop().await.unwrap();
        assert!(editor.stops().iter().all(|s| s.id != 11));
        assert_eq!(editor.screen(), &EditorScreen::RouteMap { route_id: 1 });
    }

    #[tokio::test]
    async fn test_passenger_rows_hide_students_of_other_stops() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.open_route(1).await.unwrap();
        editor.marker_tap(10).unwrap();
        editor.select_tab(StopDetailTab::Passengers).await.unwrap();

        let rows = editor.passenger_rows();
        let ids: Vec<i64> = rows.iter().map(|r| r.student.id).collect();
        // 100: en esta parada, 101: sin parada, 102: en la parada 11 (oculto)
        assert_eq!(ids, vec![100, 101]);
        assert!(rows[0].assigned_here);
        assert!(!rows[1].assigned_here);
    }

    #[tokio::test]
    async fn test_toggle_assignment_uses_server_state_then_optimistic() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.open_route(1).await.unwrap();
        editor.marker_tap(10).unwrap();
        editor.select_tab(StopDetailTab::Passengers).await.unwrap();

        editor.toggle_assignment(101, true).await.unwrap();
        assert!(editor.passenger_rows().iter().any(|r| r.student.id == 101 && r.assigned_here));

        api.set_return_entities(false);
        editor.toggle_assignment(100, false).await.unwrap();
        let student = editor.students().iter().find(|s| s.id == 100).unwrap();
        assert_eq!(student.stop_id, None);

        // Tras recargar, el backend coincide
        editor.load_students().await.unwrap();
        assert_eq!(editor.students().iter().find(|s| s.id == 101).unwrap().stop_id, Some(10));
        assert_eq!(editor.students().iter().find(|s| s.id == 100).unwrap().stop_id, None);
    }

    #[tokio::test]
    async fn test_passengers_tab_needs_saved_stop() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.open_route(1).await.unwrap();
        editor.map_tap(LatLng::new(3.0, 3.0)).unwrap();
        assert!(editor.select_tab(StopDetailTab::Passengers).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_call_keeps_state_and_alerts() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.load_routes().await.unwrap();

        api.fail_next(StatusCode::INTERNAL_SERVER_ERROR, Some("Database is down"));
        assert!(editor.load_routes().await.is_err());
        assert_eq!(editor.routes().len(), 1);
        assert_eq!(editor.take_alert().unwrap().message, "Database is down");
        assert!(editor.alert().is_none());
    }

    #[tokio::test]
    async fn test_route_deletion_needs_confirmation() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.load_routes().await.unwrap();
        editor.open_route(1).await.unwrap();

        let pending = editor.request_route_deletion(1).unwrap();
        assert!(pending.prompt().contains("North Loop"));
        assert_eq!(editor.routes().len(), 1);

        editor.confirm_route_deletion(pending).await.unwrap();
        assert!(editor.routes().is_empty());
        assert_eq!(editor.screen(), &EditorScreen::RouteList);
        assert!(editor.request_route_deletion(1).is_err());
    }

    #[tokio::test]
    async fn test_create_and_update_route() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);

        editor
            .create_route(CreateRouteRequest {
                route_name: "South Loop".to_string(),
                vehicle_id: Some(2),
                driver_id: None,
                conductor_id: None,
            })
            .await
            .unwrap();
        assert_eq!(editor.routes().len(), 2);

        let south = editor.routes().iter().find(|r| r.route_name == "South Loop").unwrap().clone();
        let mut update = UpdateRouteRequest::from(&south);
        update.route_name = "South Express".to_string();
        editor.update_route(south.id, update).await.unwrap();
        assert!(editor.routes().iter().any(|r| r.route_name == "South Express"));

        let invalid = CreateRouteRequest {
            route_name: "".to_string(),
            vehicle_id: None,
            driver_id: None,
            conductor_id: None,
        };
        assert!(editor.create_route(invalid).await.is_err());
    }

    #[tokio::test]
    async fn test_route_form_options() {
        let api = Arc::new(FakeTransportApi::with_route_and_stops());
        let mut editor = controller(&api, vec![]);
        editor.load_route_form_options().await.unwrap();
        assert_eq!(editor.form_options().vehicles.len(), 1);
        assert_eq!(editor.form_options().drivers.len(), 1);
        assert_eq!(editor.form_options().conductors.len(), 1);
    }
}
