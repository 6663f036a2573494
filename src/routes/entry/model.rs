use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::error::AppError;

/// Location name mapped to the sub-locations visited there.
pub type Destinations = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VehicleEntry {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub visitor_name: String,
    #[serde(rename = "apellido")]
    pub visitor_surname: String,
    #[serde(rename = "cedula")]
    pub national_id: String,
    #[serde(rename = "tipoVehiculo")]
    pub vehicle_types: Vec<String>,
    #[serde(rename = "placa")]
    pub plate: String,
    #[serde(rename = "lugarDestino")]
    #[sqlx(json)]
    pub destinations: Destinations,
    #[serde(rename = "fechaEntrada")]
    pub entered_at: DateTime<Utc>,
    #[serde(rename = "fechaSalida")]
    pub exited_at: Option<DateTime<Utc>>,
    #[serde(rename = "foto")]
    pub photo: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntryRequest {
    #[serde(rename = "nombre")]
    pub visitor_name: String,
    #[serde(rename = "apellido")]
    pub visitor_surname: String,
    #[serde(rename = "cedula")]
    pub national_id: String,
    #[serde(rename = "tipoVehiculo")]
    pub vehicle_types: Vec<String>,
    #[serde(rename = "placa", default)]
    pub plate: String,
    #[serde(rename = "lugarDestino")]
    pub destinations: Destinations,
    #[serde(rename = "fechaEntrada")]
    pub entered_at: Option<DateTime<Utc>>,
    #[serde(rename = "fechaSalida")]
    pub exited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEntryRequest {
    #[serde(rename = "nombre")]
    pub visitor_name: Option<String>,
    #[serde(rename = "apellido")]
    pub visitor_surname: Option<String>,
    #[serde(rename = "cedula")]
    pub national_id: Option<String>,
    #[serde(rename = "tipoVehiculo")]
    pub vehicle_types: Option<Vec<String>>,
    #[serde(rename = "placa")]
    pub plate: Option<String>,
    #[serde(rename = "lugarDestino")]
    pub destinations: Option<Destinations>,
    #[serde(rename = "fechaEntrada")]
    pub entered_at: Option<DateTime<Utc>>,
    #[serde(rename = "fechaSalida")]
    pub exited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMultipleRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCount {
    pub deleted_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub today: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStatistics {
    pub total: i64,
    pub with_exit: i64,
    pub pending: i64,
    pub today: i64,
}

#[derive(FromRow)]
struct StatisticsRow {
    total: i64,
    with_exit: i64,
    today: i64,
}

pub const MAX_LIST_LIMIT: i64 = 1000;

fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_vehicle_types(types: &[String]) -> Result<(), AppError> {
    if types.iter().all(|t| t.trim().is_empty()) {
        return Err(AppError::Validation(
            "At least one vehicle type is required".into(),
        ));
    }
    Ok(())
}

fn validate_destinations(destinations: &Destinations) -> Result<(), AppError> {
    let has_sub_location = destinations
        .values()
        .flatten()
        .any(|sub| !sub.trim().is_empty());
    if !has_sub_location {
        return Err(AppError::Validation(
            "At least one destination sub-location is required".into(),
        ));
    }
    Ok(())
}

fn validate_exit_order(
    entered_at: DateTime<Utc>,
    exited_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    match exited_at {
        Some(exit) if exit < entered_at => Err(AppError::Validation(
            "Exit time cannot be earlier than entry time".into(),
        )),
        _ => Ok(()),
    }
}

impl CreateEntryRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.visitor_name, "nombre")?;
        require_text(&self.visitor_surname, "apellido")?;
        require_text(&self.national_id, "cedula")?;
        validate_vehicle_types(&self.vehicle_types)?;
        validate_destinations(&self.destinations)?;
        validate_exit_order(self.entered_at.unwrap_or_else(Utc::now), self.exited_at)
    }
}

impl UpdateEntryRequest {
    /// Applies the supplied fields onto `entry` and validates the result.
    pub fn apply_to(self, entry: &mut VehicleEntry) -> Result<(), AppError> {
        if let Some(name) = self.visitor_name {
            require_text(&name, "nombre")?;
            entry.visitor_name = name;
        }
        if let Some(surname) = self.visitor_surname {
            require_text(&surname, "apellido")?;
            entry.visitor_surname = surname;
        }
        if let Some(national_id) = self.national_id {
            require_text(&national_id, "cedula")?;
            entry.national_id = national_id;
        }
        if let Some(types) = self.vehicle_types {
            validate_vehicle_types(&types)?;
            entry.vehicle_types = types;
        }
        if let Some(plate) = self.plate {
            entry.plate = plate;
        }
        if let Some(destinations) = self.destinations {
            validate_destinations(&destinations)?;
            entry.destinations = destinations;
        }
        if let Some(entered_at) = self.entered_at {
            entry.entered_at = entered_at;
        }
        if self.exited_at.is_some() {
            entry.exited_at = self.exited_at;
        }
        validate_exit_order(entry.entered_at, entry.exited_at)
    }
}

/// Builds an ILIKE pattern matching `term` literally anywhere in a column.
pub fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Outcome of a bulk delete: how many rows went and the photos they pointed at.
#[derive(Debug, Default, PartialEq)]
pub struct Purged {
    pub count: u64,
    pub photos: Vec<String>,
}

impl From<Vec<Option<String>>> for Purged {
    fn from(rows: Vec<Option<String>>) -> Self {
        Self {
            count: rows.len() as u64,
            photos: rows.into_iter().flatten().collect(),
        }
    }
}

const ENTRY_COLUMNS: &str = "id, visitor_name, visitor_surname, national_id, vehicle_types, plate, \
     destinations, entered_at, exited_at, photo, created_at, updated_at";

impl VehicleEntry {
    pub async fn create(pool: &PgPool, req: CreateEntryRequest) -> Result<Self, sqlx::Error> {
        let entry = sqlx::query_as::<_, VehicleEntry>(&format!(
            r#"
            INSERT INTO vehicle_entries (
                id, visitor_name, visitor_surname, national_id, vehicle_types,
                plate, destinations, entered_at, exited_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, NOW()), $9)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(req.visitor_name)
        .bind(req.visitor_surname)
        .bind(req.national_id)
        .bind(req.vehicle_types)
        .bind(req.plate)
        .bind(Json(req.destinations))
        .bind(req.entered_at)
        .bind(req.exited_at)
        .fetch_one(pool)
        .await?;

        tracing::debug!("Created vehicle entry {}", entry.id);
        Ok(entry)
    }

    pub async fn find_all(
        pool: &PgPool,
        search: Option<&str>,
        created_since: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(contains_pattern);

        sqlx::query_as::<_, VehicleEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM vehicle_entries
            WHERE ($1::text IS NULL
                   OR visitor_name ILIKE $1
                   OR visitor_surname ILIKE $1
                   OR national_id ILIKE $1
                   OR plate ILIKE $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(pattern)
        .bind(created_since)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, VehicleEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM vehicle_entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: UpdateEntryRequest,
    ) -> Result<Self, AppError> {
        let mut entry = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))?;
        req.apply_to(&mut entry)?;

        sqlx::query_as::<_, VehicleEntry>(&format!(
            r#"
            UPDATE vehicle_entries
            SET visitor_name = $2, visitor_surname = $3, national_id = $4,
                vehicle_types = $5, plate = $6, destinations = $7,
                entered_at = $8, exited_at = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&entry.visitor_name)
        .bind(&entry.visitor_surname)
        .bind(&entry.national_id)
        .bind(&entry.vehicle_types)
        .bind(&entry.plate)
        .bind(Json(&entry.destinations))
        .bind(entry.entered_at)
        .bind(entry.exited_at)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))
    }

    pub async fn set_photo(
        pool: &PgPool,
        id: Uuid,
        photo: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, VehicleEntry>(&format!(
            r#"
            UPDATE vehicle_entries
            SET photo = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(photo)
        .fetch_optional(pool)
        .await
    }

    /// Deletes one entry, returning it so the caller can clean up its photo.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, VehicleEntry>(&format!(
            "DELETE FROM vehicle_entries WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_many(pool: &PgPool, ids: &[Uuid]) -> Result<Purged, sqlx::Error> {
        let photos = sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM vehicle_entries WHERE id = ANY($1) RETURNING photo",
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;
        Ok(Purged::from(photos))
    }

    pub async fn delete_all(pool: &PgPool) -> Result<Purged, sqlx::Error> {
        let photos =
            sqlx::query_scalar::<_, Option<String>>("DELETE FROM vehicle_entries RETURNING photo")
                .fetch_all(pool)
                .await?;
        Ok(Purged::from(photos))
    }

    /// Deletes entries created strictly before `cutoff`.
    pub async fn delete_created_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<Purged, sqlx::Error> {
        let photos = sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM vehicle_entries WHERE created_at < $1 RETURNING photo",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await?;
        Ok(Purged::from(photos))
    }

    pub async fn statistics(
        pool: &PgPool,
        today_start: DateTime<Utc>,
    ) -> Result<EntryStatistics, sqlx::Error> {
        let row = sqlx::query_as::<_, StatisticsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(exited_at) AS with_exit,
                COUNT(*) FILTER (WHERE created_at >= $1) AS today
            FROM vehicle_entries
            "#,
        )
        .bind(today_start)
        .fetch_one(pool)
        .await?;

        Ok(EntryStatistics {
            total: row.total,
            with_exit: row.with_exit,
            pending: row.total - row.with_exit,
            today: row.today,
        })
    }

    /// Entries whose creation time lies within `[start, end]`.
    pub async fn find_by_date_range(
        pool: &PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, VehicleEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM vehicle_entries
            WHERE created_at >= $1 AND created_at <= $2
            ORDER BY created_at DESC
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn create_body() -> serde_json::Value {
        json!({
            "nombre": "Ana",
            "apellido": "Pérez",
            "cedula": "0102030405",
            "tipoVehiculo": ["Carro"],
            "placa": "PBC-1234",
            "lugarDestino": {"Entidades": ["Área 1"]}
        })
    }

    fn stored_entry() -> VehicleEntry {
        let now = Utc::now();
        VehicleEntry {
            id: Uuid::new_v4(),
            visitor_name: "Ana".into(),
            visitor_surname: "Pérez".into(),
            national_id: "0102030405".into(),
            vehicle_types: vec!["Carro".into()],
            plate: "PBC-1234".into(),
            destinations: BTreeMap::from([("Entidades".to_string(), vec!["Área 1".to_string()])]),
            entered_at: now,
            exited_at: None,
            photo: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_request_reads_client_field_names() {
        let req: CreateEntryRequest = serde_json::from_value(create_body()).unwrap();
        assert_eq!(req.visitor_name, "Ana");
        assert_eq!(req.vehicle_types, vec!["Carro"]);
        assert_eq!(req.destinations["Entidades"], vec!["Área 1"]);
        assert!(req.entered_at.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_requires_a_vehicle_type_and_a_sub_location() {
        let mut body = create_body();
        body["tipoVehiculo"] = json!([]);
        let req: CreateEntryRequest = serde_json::from_value(body).unwrap();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));

        let mut body = create_body();
        body["lugarDestino"] = json!({"Entidades": []});
        let req: CreateEntryRequest = serde_json::from_value(body).unwrap();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn create_rejects_exit_before_entry() {
        let mut body = create_body();
        body["fechaEntrada"] = json!("2024-05-01T10:00:00Z");
        body["fechaSalida"] = json!("2024-05-01T09:00:00Z");
        let req: CreateEntryRequest = serde_json::from_value(body).unwrap();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn setting_exit_leaves_other_fields_unchanged() {
        let original = stored_entry();
        let mut updated = original.clone();
        let exit = original.entered_at + Duration::minutes(45);

        UpdateEntryRequest {
            exited_at: Some(exit),
            ..Default::default()
        }
        .apply_to(&mut updated)
        .unwrap();

        assert_eq!(updated.exited_at, Some(exit));
        assert_eq!(
            VehicleEntry {
                exited_at: None,
                ..updated
            },
            original
        );
    }

    #[test]
    fn update_rejects_exit_before_entry() {
        let mut entry = stored_entry();
        let err = UpdateEntryRequest {
            exited_at: Some(entry.entered_at - Duration::hours(1)),
            ..Default::default()
        }
        .apply_to(&mut entry);
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[test]
    fn update_rejects_emptying_vehicle_types() {
        let mut entry = stored_entry();
        let err = UpdateEntryRequest {
            vehicle_types: Some(vec![]),
            ..Default::default()
        }
        .apply_to(&mut entry);
        assert!(err.is_err());
    }

    #[test]
    fn entry_serializes_with_client_field_names() {
        let value = serde_json::to_value(stored_entry()).unwrap();
        assert_eq!(value["tipoVehiculo"], json!(["Carro"]));
        assert_eq!(value["lugarDestino"], json!({"Entidades": ["Área 1"]}));
        assert_eq!(value["fechaSalida"], serde_json::Value::Null);
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("abc"), "%abc%");
        assert_eq!(contains_pattern(" 50%_off "), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn purged_counts_rows_and_keeps_only_real_photos() {
        let purged = Purged::from(vec![
            Some("/uploads/a.png".to_string()),
            None,
            Some("/uploads/b.jpg".to_string()),
        ]);
        assert_eq!(purged.count, 3);
        assert_eq!(purged.photos, vec!["/uploads/a.png", "/uploads/b.jpg"]);
    }
}
