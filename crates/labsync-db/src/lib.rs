//! Postgres adapter for the clinical record store.
//!
//! Free functions over a `PgPool`. Reference data lookups live here; the
//! visit graph load/save boundary lives in `visit`.

use anyhow::{Context, Result};
use labsync_reconcile::{EncounterRole, EncounterType, Provider};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

mod visit;

pub use visit::{find_encounter, find_or_open_visit, load_visit, save_encounter_transaction, save_visit};

pub const ENV_DB_URL: &str = "LABSYNC_DATABASE_URL";

/// Connect to Postgres using LABSYNC_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_observations_table: bool,
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='observations'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_observations_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

fn provider_from_row(row: &PgRow) -> Result<Provider> {
    Ok(Provider {
        uuid: row.try_get("uuid")?,
        identifier: row.try_get("identifier")?,
        name: row.try_get("name")?,
    })
}

pub async fn provider_by_uuid(pool: &PgPool, uuid: &str) -> Result<Option<Provider>> {
    let row = sqlx::query("select uuid, identifier, name from providers where uuid = $1")
        .bind(uuid)
        .fetch_optional(pool)
        .await
        .context("provider_by_uuid failed")?;
    row.as_ref().map(provider_from_row).transpose()
}

pub async fn provider_by_identifier(pool: &PgPool, identifier: &str) -> Result<Option<Provider>> {
    let row = sqlx::query("select uuid, identifier, name from providers where identifier = $1")
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .context("provider_by_identifier failed")?;
    row.as_ref().map(provider_from_row).transpose()
}

/// Every provider whose uuid is in `uuids`. Unknown uuids are simply absent.
pub async fn providers_by_uuids(pool: &PgPool, uuids: &[String]) -> Result<Vec<Provider>> {
    if uuids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query("select uuid, identifier, name from providers where uuid = any($1)")
        .bind(uuids)
        .fetch_all(pool)
        .await
        .context("providers_by_uuids failed")?;
    rows.iter().map(provider_from_row).collect()
}

pub async fn encounter_type_by_name(pool: &PgPool, name: &str) -> Result<Option<EncounterType>> {
    let row = sqlx::query("select uuid, name from encounter_types where name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("encounter_type_by_name failed")?;
    row.map(|r| -> Result<EncounterType> {
        Ok(EncounterType {
            uuid: r.try_get("uuid")?,
            name: r.try_get("name")?,
        })
    })
    .transpose()
}

pub async fn encounter_role_by_uuid(pool: &PgPool, uuid: &str) -> Result<Option<EncounterRole>> {
    let row = sqlx::query("select uuid, name from encounter_roles where uuid = $1")
        .bind(uuid)
        .fetch_optional(pool)
        .await
        .context("encounter_role_by_uuid failed")?;
    row.map(|r| -> Result<EncounterRole> {
        Ok(EncounterRole {
            uuid: r.try_get("uuid")?,
            name: r.try_get("name")?,
        })
    })
    .transpose()
}

// Reference data is owned by the clinical system; these upserts exist for
// bootstrapping and tests.

pub async fn upsert_provider(pool: &PgPool, p: &Provider) -> Result<()> {
    sqlx::query(
        r#"
        insert into providers (uuid, identifier, name) values ($1, $2, $3)
        on conflict (uuid) do update set identifier = excluded.identifier, name = excluded.name
        "#,
    )
    .bind(&p.uuid)
    .bind(&p.identifier)
    .bind(&p.name)
    .execute(pool)
    .await
    .context("upsert_provider failed")?;
    Ok(())
}

pub async fn upsert_encounter_type(pool: &PgPool, t: &EncounterType) -> Result<()> {
    sqlx::query(
        r#"
        insert into encounter_types (uuid, name) values ($1, $2)
        on conflict (uuid) do update set name = excluded.name
        "#,
    )
    .bind(&t.uuid)
    .bind(&t.name)
    .execute(pool)
    .await
    .context("upsert_encounter_type failed")?;
    Ok(())
}

pub async fn upsert_encounter_role(pool: &PgPool, r: &EncounterRole) -> Result<()> {
    sqlx::query(
        r#"
        insert into encounter_roles (uuid, name) values ($1, $2)
        on conflict (uuid) do update set name = excluded.name
        "#,
    )
    .bind(&r.uuid)
    .bind(&r.name)
    .execute(pool)
    .await
    .context("upsert_encounter_role failed")?;
    Ok(())
}
