//! DTOs genéricos del backend de transporte
//!
//! El backend a veces envuelve la respuesta en `{ "data": ... }` y a veces
//! devuelve el valor directamente; los errores llegan como `{ "message": ... }`.

use serde::{Deserialize, Serialize};

/// Respuesta envuelta o directa
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiEnvelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> ApiEnvelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            ApiEnvelope::Wrapped { data } => data,
            ApiEnvelope::Bare(value) => value,
        }
    }
}

/// Cuerpo de error del backend
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Query de `/transport/staff`
#[derive(Debug, Serialize)]
pub struct StaffQuery<'a> {
    pub role: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::Route;

    #[test]
    fn test_envelope_accepts_both_shapes() {
        let wrapped: ApiEnvelope<Vec<Route>> =
            serde_json::from_str(r#"{"data": [{"id": 1, "route_name": "A"}]}"#).unwrap();
        assert_eq!(wrapped.into_inner().len(), 1);

        let bare: ApiEnvelope<Vec<Route>> =
            serde_json::from_str(r#"[{"id": 1, "route_name": "A"}, {"id": 2, "route_name": "B"}]"#).unwrap();
        assert_eq!(bare.into_inner().len(), 2);
    }

    #[test]
    fn test_error_body_without_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"error": "x"}"#).unwrap();
        assert!(body.message.is_none());
    }
}
