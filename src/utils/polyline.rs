//! Codificación de polilíneas (formato Google / OSRM, precisión 5)
//!
//! OSRM devuelve la geometría de la ruta como una polilínea codificada cuando
//! se pide `geometries=polyline`. Cada coordenada se guarda como delta respecto
//! a la anterior, en orden (lat, lng), multiplicada por 1e5 y codificada en
//! grupos de 5 bits.

use crate::models::location::LatLng;
use crate::utils::errors::{AppError, AppResult};

const PRECISION: f64 = 1e5;

/// Decodificar una polilínea en una secuencia de puntos `{latitude, longitude}`
pub fn decode(encoded: &str) -> AppResult<Vec<LatLng>> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        let (dlat, next) = decode_value(bytes, index)?;
        let (dlng, next) = decode_value(bytes, next)?;
        index = next;

        lat = lat.checked_add(dlat).ok_or_else(overflow)?;
        lng = lng.checked_add(dlng).ok_or_else(overflow)?;

        let point = LatLng {
            latitude: lat as f64 / PRECISION,
            longitude: lng as f64 / PRECISION,
        };
        if !(-90.0..=90.0).contains(&point.latitude) || !(-180.0..=180.0).contains(&point.longitude) {
            return Err(AppError::InvalidState(format!(
                "polyline point out of range ({}, {})",
                point.latitude, point.longitude
            )));
        }
        points.push(point);
    }

    Ok(points)
}

/// Codificar puntos como polilínea; inverso de [`decode`]
pub fn encode(points: &[LatLng]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for point in points {
        let lat = (point.latitude * PRECISION).round() as i64;
        let lng = (point.longitude * PRECISION).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn overflow() -> AppError {
    AppError::InvalidState("polyline value overflow".to_string())
}

fn decode_value(bytes: &[u8], mut index: usize) -> AppResult<(i64, usize)> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes
            .get(index)
            .ok_or_else(|| AppError::InvalidState("truncated polyline".to_string()))?;
        if !(63..=126).contains(&byte) {
            return Err(AppError::InvalidState(format!(
                "invalid polyline character '{}' at {}",
                byte as char, index
            )));
        }
        if shift > 60 {
            return Err(overflow());
        }

        let chunk = (byte - 63) as i64;
        index += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    let value = if result & 1 != 0 { !(result >> 1) } else { result >> 1 };
    Ok((value, index))
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push((((v & 0x1f) | 0x20) as u8 + 63) as char);
        v >>= 5;
    }
    out.push((v as u8 + 63) as char);
}
