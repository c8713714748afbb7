//! Cliente HTTP para el backend de transporte escolar
//!
//! Este módulo contiene el trait `TransportApi` (la costura que usan los
//! controladores) y su implementación sobre `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::EnvironmentConfig;
use crate::dto::transport_dto::{ApiEnvelope, ErrorBody, StaffQuery};
use crate::models::attendance::{AttendanceFilters, AttendanceRecord, MarkAttendanceRequest};
use crate::models::passenger::{AssignStopRequest, Student};
use crate::models::route::{CreateRouteRequest, Route, UpdateRouteRequest};
use crate::models::staff::{StaffMember, StaffRole, Vehicle};
use crate::models::stop::{CreateStopRequest, Stop, UpdateStopRequest};
use crate::utils::errors::{AppError, AppResult};

/// Operaciones del backend que usa el módulo de transporte
///
/// Las escrituras devuelven `Option<T>`: `None` cuando el backend responde
/// sin cuerpo o sin la entidad actualizada.
#[async_trait]
pub trait TransportApi: Send + Sync {
    async fn list_routes(&self) -> AppResult<Vec<Route>>;
    async fn create_route(&self, request: &CreateRouteRequest) -> AppResult<Option<Route>>;
    async fn update_route(&self, route_id: i64, request: &UpdateRouteRequest) -> AppResult<Option<Route>>;
    async fn delete_route(&self, route_id: i64) -> AppResult<()>;

    async fn list_stops(&self, route_id: i64) -> AppResult<Vec<Stop>>;
    async fn create_stop(&self, request: &CreateStopRequest) -> AppResult<Option<Stop>>;
    async fn update_stop(&self, stop_id: i64, request: &UpdateStopRequest) -> AppResult<Option<Stop>>;
    async fn delete_stop(&self, stop_id: i64) -> AppResult<()>;

    async fn list_students(&self) -> AppResult<Vec<Student>>;
    async fn list_route_students(&self, route_id: i64) -> AppResult<Vec<Student>>;
    async fn assign_student_stop(&self, student_id: i64, stop_id: Option<i64>) -> AppResult<Option<Student>>;

    async fn mark_attendance(&self, request: &MarkAttendanceRequest) -> AppResult<Option<AttendanceRecord>>;
    async fn list_attendance(&self, filters: &AttendanceFilters) -> AppResult<Vec<AttendanceRecord>>;

    async fn driver_route(&self) -> AppResult<Route>;
    async fn rider_route(&self) -> AppResult<Route>;

    async fn list_vehicles(&self) -> AppResult<Vec<Vehicle>>;
    async fn list_staff(&self, role: StaffRole) -> AppResult<Vec<StaffMember>>;
}

/// Cliente HTTP para `/transport/*`
#[derive(Clone)]
pub struct HttpTransportApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransportApi {
    /// Crear nuevo cliente HTTP con la URL base y el token de la sesión
    pub fn new(base_url: impl Into<String>, token: Option<String>, config: &EnvironmentConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent("SchoolBusTracker/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &EnvironmentConfig) -> AppResult<Self> {
        Self::new(config.api_base_url.clone(), config.api_token.clone(), config)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("🌐 {} {}", method, url);

        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Enviar la petición y convertir respuestas no-2xx en `AppError::Api`
    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message);
        log::warn!("❌ API respondió {}: {}", status, message.as_deref().unwrap_or(&body));

        Err(AppError::Api { status, message })
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        let envelope: ApiEnvelope<T> = response.json().await?;
        Ok(envelope.into_inner())
    }

    async fn write<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> AppResult<Option<T>> {
        let response = self.send(self.request(method, path).json(body)).await?;
        let text = response.text().await?;
        Ok(extract_entity(&text))
    }
}

/// Extraer la entidad de una respuesta de escritura, envuelta o directa
///
/// Un cuerpo vacío, o uno que no contiene la entidad (p. ej. solo `message`),
/// devuelve `None`.
pub fn extract_entity<T: DeserializeOwned>(body: &str) -> Option<T> {
    if body.trim().is_empty() {
        return None;
    }
    let value: Value = serde_json::from_str(body).ok()?;
    let candidate = match value {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data")?,
        other => other,
    };
    serde_json::from_value(candidate).ok()
}

#[async_trait]
impl TransportApi for HttpTransportApi {
    async fn list_routes(&self) -> AppResult<Vec<Route>> {
        self.get_list("/transport/routes").await
    }

    async fn create_route(&self, request: &CreateRouteRequest) -> AppResult<Option<Route>> {
        log::info!("🚌 Creando ruta '{}'", request.route_name);
        self.write(Method::POST, "/transport/routes", request).await
    }

    async fn update_route(&self, route_id: i64, request: &UpdateRouteRequest) -> AppResult<Option<Route>> {
        log::info!("✏️ Actualizando ruta {}", route_id);
        self.write(Method::PUT, &format!("/transport/routes/{}", route_id), request)
            .await
    }

    async fn delete_route(&self, route_id: i64) -> AppResult<()> {
        log::info!("🗑️ Eliminando ruta {}", route_id);
        self.send(self.request(Method::DELETE, &format!("/transport/routes/{}", route_id)))
            .await?;
        Ok(())
    }

    async fn list_stops(&self, route_id: i64) -> AppResult<Vec<Stop>> {
        self.get_list(&format!("/transport/routes/{}/stops", route_id)).await
    }

    async fn create_stop(&self, request: &CreateStopRequest) -> AppResult<Option<Stop>> {
        log::info!(
            "📍 Creando parada '{}' (orden {}) en ruta {}",
            request.stop_name,
            request.stop_order,
            request.route_id
        );
        self.write(Method::POST, "/transport/stops", request).await
    }

    async fn update_stop(&self, stop_id: i64, request: &UpdateStopRequest) -> AppResult<Option<Stop>> {
        self.write(Method::PUT, &format!("/transport/stops/{}", stop_id), request)
            .await
    }

    async fn delete_stop(&self, stop_id: i64) -> AppResult<()> {
        log::info!("🗑️ Eliminando parada {}", stop_id);
        self.send(self.request(Method::DELETE, &format!("/transport/stops/{}", stop_id)))
            .await?;
        Ok(())
    }

    async fn list_students(&self) -> AppResult<Vec<Student>> {
        self.get_list("/transport/students").await
    }

    async fn list_route_students(&self, route_id: i64) -> AppResult<Vec<Student>> {
        self.get_list(&format!("/transport/routes/{}/students", route_id)).await
    }

    async fn assign_student_stop(&self, student_id: i64, stop_id: Option<i64>) -> AppResult<Option<Student>> {
        self.write(
            Method::PUT,
            &format!("/transport/students/{}/stop", student_id),
            &AssignStopRequest { stop_id },
        )
        .await
    }

    async fn mark_attendance(&self, request: &MarkAttendanceRequest) -> AppResult<Option<AttendanceRecord>> {
        self.write(Method::POST, "/transport/attendance", request).await
    }

    async fn list_attendance(&self, filters: &AttendanceFilters) -> AppResult<Vec<AttendanceRecord>> {
        let response = self
            .send(self.request(Method::GET, "/transport/attendance").query(filters))
            .await?;
        let envelope: ApiEnvelope<Vec<AttendanceRecord>> = response.json().await?;
        Ok(envelope.into_inner())
    }

    async fn driver_route(&self) -> AppResult<Route> {
        self.get_list("/transport/driver/route").await
    }

    async fn rider_route(&self) -> AppResult<Route> {
        self.get_list("/transport/student/route").await
    }

    async fn list_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        self.get_list("/transport/vehicles").await
    }

    async fn list_staff(&self, role: StaffRole) -> AppResult<Vec<StaffMember>> {
        let response = self
            .send(
                self.request(Method::GET, "/transport/staff")
                    .query(&StaffQuery { role: role.as_str() }),
            )
            .await?;
        let envelope: ApiEnvelope<Vec<StaffMember>> = response.json().await?;
        Ok(envelope.into_inner())
    }
}
