use sqlx::PgPool;

use crate::error::AppError;
use crate::permissions::Role;
use crate::routes::auth::{RegisterRequest, User};

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

fn default_full_name(role: Role) -> &'static str {
    match role {
        Role::Daily => "Administrador Diario",
        Role::Weekly => "Administrador Semanal",
        Role::Yearly => "Administrador Anual",
    }
}

/// Ensures one admin account per tier exists, named after the role tag.
/// Existing accounts are left untouched. Returns how many were created.
pub async fn seed_default_admins(pool: &PgPool, password: Option<&str>) -> Result<usize, AppError> {
    let password = match password {
        Some(p) => p,
        None => {
            tracing::warn!("SEED_ADMIN_PASSWORD not set, seeding with the default password");
            DEFAULT_ADMIN_PASSWORD
        }
    };

    let mut created = 0;
    for role in Role::ALL {
        let username = role.as_str();
        if User::find_by_username(pool, username).await?.is_some() {
            continue;
        }

        User::create(
            pool,
            &RegisterRequest {
                username: username.to_string(),
                password: password.to_string(),
                full_name: default_full_name(role).to_string(),
                role,
            },
        )
        .await?;
        created += 1;
    }

    if created > 0 {
        tracing::info!("Seeded {} default admin accounts", created);
    }
    Ok(created)
}
