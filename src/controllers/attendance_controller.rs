//! Toma de asistencia del conductor
//!
//! Al tocar una parada se listan los estudiantes asignados a ella; cada
//! marca se envía con la ruta, el viaje y la fecha del día.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::clients::transport_api_client::TransportApi;
use crate::controllers::Alert;
use crate::models::attendance::{AttendanceFilters, AttendanceStatus, AttendanceSummary, MarkAttendanceRequest};
use crate::models::passenger::Student;
use crate::utils::errors::{invalid_state_error, not_found_error, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRow {
    pub student: Student,
    pub status: Option<AttendanceStatus>,
}

pub struct AttendanceCollector {
    api: Arc<dyn TransportApi>,
    route_id: i64,
    trip_id: Uuid,
    date: NaiveDate,
    stop_id: Option<i64>,
    students: Vec<Student>,
    marks: HashMap<i64, AttendanceStatus>,
    alert: Option<Alert>,
}

impl AttendanceCollector {
    /// Un viaje nuevo por sesión de conductor
    pub fn new(api: Arc<dyn TransportApi>, route_id: i64, date: NaiveDate) -> Self {
        Self::with_trip(api, route_id, Uuid::new_v4(), date)
    }

    pub fn with_trip(api: Arc<dyn TransportApi>, route_id: i64, trip_id: Uuid, date: NaiveDate) -> Self {
        Self {
            api,
            route_id,
            trip_id,
            date,
            stop_id: None,
            students: Vec::new(),
            marks: HashMap::new(),
            alert: None,
        }
    }

    pub fn trip_id(&self) -> Uuid {
        self.trip_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn stop_id(&self) -> Option<i64> {
        self.stop_id
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    pub fn take_alert(&mut self) -> Option<Alert> {
        self.alert.take()
    }

    /// Abrir la lista de una parada
    pub async fn select_stop(&mut self, stop_id: i64) -> AppResult<()> {
        let students = match self.api.list_route_students(self.route_id).await {
            Ok(students) => students,
            Err(e) => {
                log::warn!("❌ No se pudieron cargar los estudiantes de la ruta {}: {}", self.route_id, e);
                self.alert = Some(Alert::error(&e));
                return Err(e);
            }
        };

        self.stop_id = Some(stop_id);
        self.students = students.into_iter().filter(|s| s.is_assigned_to(stop_id)).collect();
        self.marks.clear();

        // Marcas previas del día; si fallan la lista se muestra sin marcar
        let filters = AttendanceFilters {
            route_id: self.route_id,
            stop_id,
            date: self.date,
        };
        match self.api.list_attendance(&filters).await {
            Ok(records) => {
                for record in records {
                    if self.students.iter().any(|s| s.id == record.student_id) {
                        self.marks.insert(record.student_id, record.status);
                    }
                }
            }
            Err(e) => log::warn!("⚠️ Sin marcas previas para la parada {}: {}", stop_id, e),
        }

        log::info!(
            "📋 Parada {}: {} estudiantes, {} ya marcados",
            stop_id,
            self.students.len(),
            self.marks.len()
        );
        Ok(())
    }

    /// Marcar presente o ausente
    ///
    /// Si el backend devuelve el registro, su estado es el que se muestra;
    /// si no, se aplica el estado enviado. Solo cambia la fila de ese estudiante.
    pub async fn mark(&mut self, student_id: i64, status: AttendanceStatus) -> AppResult<()> {
        let stop_id = self
            .stop_id
            .ok_or_else(|| invalid_state_error("Select a stop before marking attendance"))?;
        if !self.students.iter().any(|s| s.id == student_id) {
            return Err(not_found_error("Student", &student_id.to_string()));
        }

        let request = MarkAttendanceRequest {
            student_id,
            stop_id,
            route_id: self.route_id,
            trip_id: self.trip_id,
            date: self.date,
            status,
        };

        match self.api.mark_attendance(&request).await {
            Ok(record) => {
                let confirmed = record
                    .filter(|r| r.student_id == student_id)
                    .map(|r| r.status)
                    .unwrap_or(status);
                self.marks.insert(student_id, confirmed);
                log::info!("✅ Estudiante {} marcado {}", student_id, confirmed.as_str());
                Ok(())
            }
            Err(e) => {
                log::warn!("❌ Error marcando asistencia de {}: {}", student_id, e);
                self.alert = Some(Alert::error(&e));
                Err(e)
            }
        }
    }

    pub fn status_of(&self, student_id: i64) -> Option<AttendanceStatus> {
        self.marks.get(&student_id).copied()
    }

    pub fn rows(&self) -> Vec<AttendanceRow> {
        self.students
            .iter()
            .map(|s| AttendanceRow {
                student: s.clone(),
                status: self.status_of(s.id),
            })
            .collect()
    }

    pub fn summary(&self) -> AttendanceSummary {
        self.students
            .iter()
            .fold(AttendanceSummary::default(), |mut acc, s| {
                match self.status_of(s.id) {
                    Some(AttendanceStatus::Present) => acc.present += 1,
                    Some(AttendanceStatus::Absent) => acc.absent += 1,
                    None => acc.unmarked += 1,
                }
                acc
            })
    }

    pub fn close_stop(&mut self) {
        self.stop_id = None;
        self.students.clear();
        self.marks.clear();
    }
}
