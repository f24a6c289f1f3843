//! `labsync seed-reference`: create the encounter types, role and fallback
//! provider the configured settings refer to.

use anyhow::Result;
use labsync_config::SyncConfig;
use labsync_reconcile::{new_uuid, EncounterRole, EncounterType, Provider};
use sqlx::PgPool;

pub async fn seed_reference(pool: &PgPool, settings: &SyncConfig) -> Result<()> {
    for name in [
        &settings.lab_result_encounter_type,
        &settings.lab_order_encounter_type,
    ] {
        if labsync_db::encounter_type_by_name(pool, name).await?.is_none() {
            labsync_db::upsert_encounter_type(pool, &EncounterType::new(new_uuid(), name.as_str())).await?;
            println!("encounter_type_created={name}");
        }
    }

    let role_uuid = &settings.unknown_encounter_role_uuid;
    if labsync_db::encounter_role_by_uuid(pool, role_uuid).await?.is_none() {
        labsync_db::upsert_encounter_role(pool, &EncounterRole::new(role_uuid.as_str(), "Unknown")).await?;
        println!("encounter_role_created={role_uuid}");
    }

    let ident = &settings.system_provider_identifier;
    if labsync_db::provider_by_identifier(pool, ident).await?.is_none() {
        labsync_db::upsert_provider(pool, &Provider::new(new_uuid(), ident.as_str(), "System")).await?;
        println!("provider_created={ident}");
    }

    println!("reference_data_ok=true");
    Ok(())
}
