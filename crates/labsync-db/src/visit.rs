use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use labsync_reconcile::{
    new_uuid, Encounter, EncounterProvider, EncounterRole, EncounterType, ObsValue, Observation,
    Order, Provider, Visit,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

const ENCOUNTER_SELECT: &str = r#"
    select
      e.uuid,
      e.visit_uuid,
      e.patient_uuid,
      e.encounter_datetime,
      e.voided,
      t.uuid as type_uuid,
      t.name as type_name,
      p.uuid as provider_uuid,
      p.identifier as provider_identifier,
      p.name as provider_name,
      r.uuid as role_uuid,
      r.name as role_name
    from encounters e
    join encounter_types t on t.uuid = e.encounter_type_uuid
    left join providers p on p.uuid = e.provider_uuid
    left join encounter_roles r on r.uuid = e.encounter_role_uuid
"#;

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

fn encounter_from_row(row: &PgRow) -> Result<Encounter> {
    let provider_uuid: Option<String> = row.try_get("provider_uuid")?;
    let role_uuid: Option<String> = row.try_get("role_uuid")?;

    let provider = match (provider_uuid, role_uuid) {
        (Some(uuid), Some(role_uuid)) => Some(EncounterProvider {
            provider: Provider {
                uuid,
                identifier: row.try_get("provider_identifier")?,
                name: row.try_get("provider_name")?,
            },
            role: EncounterRole {
                uuid: role_uuid,
                name: row.try_get("role_name")?,
            },
        }),
        _ => None,
    };

    Ok(Encounter {
        uuid: row.try_get("uuid")?,
        visit_uuid: row.try_get("visit_uuid")?,
        patient_uuid: row.try_get("patient_uuid")?,
        encounter_type: EncounterType {
            uuid: row.try_get("type_uuid")?,
            name: row.try_get("type_name")?,
        },
        encounter_datetime: row.try_get("encounter_datetime")?,
        provider,
        observations: Vec::new(),
        orders: Vec::new(),
        voided: row.try_get("voided")?,
    })
}

fn observation_from_row(row: &PgRow) -> Result<Observation> {
    let numeric: Option<f64> = row.try_get("value_numeric")?;
    let text: Option<String> = row.try_get("value_text")?;
    let value = match (numeric, text) {
        (Some(n), _) => Some(ObsValue::Numeric(n)),
        (None, Some(t)) => Some(ObsValue::Text(t)),
        (None, None) => None,
    };

    Ok(Observation {
        uuid: row.try_get("uuid")?,
        concept_uuid: row.try_get("concept_uuid")?,
        obs_datetime: row.try_get("obs_datetime")?,
        value,
        order_uuid: row.try_get("order_uuid")?,
        abnormal: row.try_get("abnormal")?,
        voided: row.try_get("voided")?,
        void_reason: row.try_get("void_reason")?,
        group_members: Vec::new(),
    })
}

/// Fill orders and the observation tree of already-loaded encounters.
async fn load_children(pool: &PgPool, encounters: &mut [Encounter]) -> Result<()> {
    if encounters.is_empty() {
        return Ok(());
    }
    let uuids: Vec<String> = encounters.iter().map(|e| e.uuid.clone()).collect();

    let order_rows = sqlx::query(
        r#"
        select uuid, encounter_uuid, concept_uuid, voided
        from orders
        where encounter_uuid = any($1)
        order by seq
        "#,
    )
    .bind(&uuids)
    .fetch_all(pool)
    .await
    .context("load orders failed")?;

    for row in &order_rows {
        let encounter_uuid: String = row.try_get("encounter_uuid")?;
        if let Some(enc) = encounters.iter_mut().find(|e| e.uuid == encounter_uuid) {
            enc.orders.push(Order {
                uuid: row.try_get("uuid")?,
                concept_uuid: row.try_get("concept_uuid")?,
                voided: row.try_get("voided")?,
            });
        }
    }

    let obs_rows = sqlx::query(
        r#"
        select
          uuid, encounter_uuid, parent_uuid, concept_uuid, obs_datetime,
          value_numeric, value_text, order_uuid, abnormal, voided, void_reason
        from observations
        where encounter_uuid = any($1)
        order by seq
        "#,
    )
    .bind(&uuids)
    .fetch_all(pool)
    .await
    .context("load observations failed")?;

    // Parents are always inserted before their members, so seq order sees
    // every grouping before anything nested under it.
    for row in &obs_rows {
        let encounter_uuid: String = row.try_get("encounter_uuid")?;
        let parent_uuid: Option<String> = row.try_get("parent_uuid")?;
        let obs = observation_from_row(row)?;

        let enc = encounters
            .iter_mut()
            .find(|e| e.uuid == encounter_uuid)
            .ok_or_else(|| anyhow!("observation {} references unloaded encounter", obs.uuid))?;

        match parent_uuid {
            None => enc.observations.push(obs),
            Some(parent) => {
                let group = enc
                    .observations
                    .iter_mut()
                    .find(|o| o.uuid == parent)
                    .ok_or_else(|| anyhow!("observation {} has missing parent {parent}", obs.uuid))?;
                group.group_members.push(obs);
            }
        }
    }
    Ok(())
}

/// Encounter by its stable uuid, with orders and observations.
pub async fn find_encounter(pool: &PgPool, uuid: &str) -> Result<Option<Encounter>> {
    let row = sqlx::query(&format!("{ENCOUNTER_SELECT} where e.uuid = $1"))
        .bind(uuid)
        .fetch_optional(pool)
        .await
        .context("find_encounter failed")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut encounters = vec![encounter_from_row(&row)?];
    load_children(pool, &mut encounters).await?;
    Ok(encounters.pop())
}

/// Whole visit graph. Encounters come back in insertion order.
pub async fn load_visit(pool: &PgPool, uuid: &str) -> Result<Option<Visit>> {
    let row = sqlx::query("select uuid, patient_uuid, started_at from visits where uuid = $1")
        .bind(uuid)
        .fetch_optional(pool)
        .await
        .context("load_visit failed")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut visit = Visit::new(
        row.try_get::<String, _>("uuid")?,
        row.try_get::<String, _>("patient_uuid")?,
        row.try_get::<DateTime<Utc>, _>("started_at")?,
    );

    let rows = sqlx::query(&format!("{ENCOUNTER_SELECT} where e.visit_uuid = $1 order by e.seq"))
        .bind(uuid)
        .fetch_all(pool)
        .await
        .context("load visit encounters failed")?;

    let mut encounters = rows
        .iter()
        .map(encounter_from_row)
        .collect::<Result<Vec<_>>>()?;
    load_children(pool, &mut encounters).await?;
    for enc in encounters {
        visit.add_encounter(enc);
    }
    Ok(Some(visit))
}

/// Latest open visit of the patient, or a new one started at `at`.
///
/// A newly opened visit is persisted immediately so the order encounter
/// saved next has something to reference.
pub async fn find_or_open_visit(pool: &PgPool, patient_uuid: &str, at: DateTime<Utc>) -> Result<Visit> {
    let open: Option<(String,)> = sqlx::query_as::<_, (String,)>(
        r#"
        select uuid
        from visits
        where patient_uuid = $1 and stopped_at is null
        order by started_at desc
        limit 1
        "#,
    )
    .bind(patient_uuid)
    .fetch_optional(pool)
    .await
    .context("find open visit failed")?;

    if let Some((uuid,)) = open {
        return load_visit(pool, &uuid)
            .await?
            .ok_or_else(|| anyhow!("visit {uuid} vanished while loading"));
    }

    let visit = Visit::new(new_uuid(), patient_uuid, at);
    sqlx::query("insert into visits (uuid, patient_uuid, started_at) values ($1, $2, $3)")
        .bind(&visit.uuid)
        .bind(&visit.patient_uuid)
        .bind(visit.started_at)
        .execute(pool)
        .await
        .context("open visit failed")?;
    Ok(visit)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

fn split_value(value: &Option<ObsValue>) -> (Option<f64>, Option<&str>) {
    match value {
        Some(ObsValue::Numeric(n)) => (Some(*n), None),
        Some(ObsValue::Text(t)) => (None, Some(t.as_str())),
        None => (None, None),
    }
}

/// Observations are immutable apart from their void state.
async fn upsert_observation(
    conn: &mut PgConnection,
    encounter_uuid: &str,
    parent_uuid: Option<&str>,
    obs: &Observation,
) -> Result<()> {
    let (numeric, text) = split_value(&obs.value);
    sqlx::query(
        r#"
        insert into observations (
          uuid, encounter_uuid, parent_uuid, concept_uuid, obs_datetime,
          value_numeric, value_text, order_uuid, abnormal, voided, void_reason
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        on conflict (uuid) do update
          set voided = excluded.voided,
              void_reason = excluded.void_reason
        "#,
    )
    .bind(&obs.uuid)
    .bind(encounter_uuid)
    .bind(parent_uuid)
    .bind(&obs.concept_uuid)
    .bind(obs.obs_datetime)
    .bind(numeric)
    .bind(text)
    .bind(&obs.order_uuid)
    .bind(obs.abnormal)
    .bind(obs.voided)
    .bind(&obs.void_reason)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("upsert observation {} failed", obs.uuid))?;
    Ok(())
}

async fn upsert_encounter(conn: &mut PgConnection, enc: &Encounter) -> Result<()> {
    sqlx::query(
        r#"
        insert into encounters (
          uuid, visit_uuid, patient_uuid, encounter_type_uuid, encounter_datetime,
          provider_uuid, encounter_role_uuid, voided
        ) values ($1, $2, $3, $4, $5, $6, $7, $8)
        on conflict (uuid) do update
          set encounter_datetime = excluded.encounter_datetime,
              provider_uuid = excluded.provider_uuid,
              encounter_role_uuid = excluded.encounter_role_uuid,
              voided = excluded.voided
        "#,
    )
    .bind(&enc.uuid)
    .bind(&enc.visit_uuid)
    .bind(&enc.patient_uuid)
    .bind(&enc.encounter_type.uuid)
    .bind(enc.encounter_datetime)
    .bind(enc.provider.as_ref().map(|p| p.provider.uuid.as_str()))
    .bind(enc.provider.as_ref().map(|p| p.role.uuid.as_str()))
    .bind(enc.voided)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("upsert encounter {} failed", enc.uuid))?;

    for order in &enc.orders {
        sqlx::query(
            r#"
            insert into orders (uuid, encounter_uuid, concept_uuid, voided)
            values ($1, $2, $3, $4)
            on conflict (uuid) do update set voided = excluded.voided
            "#,
        )
        .bind(&order.uuid)
        .bind(&enc.uuid)
        .bind(&order.concept_uuid)
        .bind(order.voided)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("upsert order {} failed", order.uuid))?;
    }

    // Vector order puts a voided record before its replacement, which keeps
    // the one-live-observation indexes satisfied statement by statement.
    for obs in &enc.observations {
        upsert_observation(conn, &enc.uuid, None, obs).await?;
        for member in &obs.group_members {
            upsert_observation(conn, &enc.uuid, Some(&obs.uuid), member).await?;
        }
    }
    Ok(())
}

/// Persist one encounter with its orders and observations atomically.
pub async fn save_encounter_transaction(pool: &PgPool, encounter: &Encounter) -> Result<()> {
    let mut tx = pool.begin().await.context("begin encounter tx failed")?;
    upsert_encounter(&mut *tx, encounter).await?;
    tx.commit().await.context("commit encounter tx failed")?;
    Ok(())
}

/// Commit boundary of a reconciliation pass: the visit and everything it
/// owns, in one transaction.
pub async fn save_visit(pool: &PgPool, visit: &Visit) -> Result<()> {
    let mut tx = pool.begin().await.context("begin visit tx failed")?;

    sqlx::query(
        r#"
        insert into visits (uuid, patient_uuid, started_at) values ($1, $2, $3)
        on conflict (uuid) do nothing
        "#,
    )
    .bind(&visit.uuid)
    .bind(&visit.patient_uuid)
    .bind(visit.started_at)
    .execute(&mut *tx)
    .await
    .context("upsert visit failed")?;

    for enc in visit.encounters() {
        upsert_encounter(&mut *tx, enc).await?;
    }

    tx.commit().await.context("commit visit tx failed")?;
    Ok(())
}
