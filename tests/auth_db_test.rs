mod common;

use vehicle_entries::error::AppError;
use vehicle_entries::permissions::Role;
use vehicle_entries::routes::auth::{RegisterRequest, User};

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn login_returns_stored_role() {
    let pool = common::pool().await;
    let user = common::create_user(&pool, Role::Weekly, "secret123").await;

    let logged_in = User::authenticate(&pool, &user.username, "secret123")
        .await
        .expect("valid credentials");
    assert_eq!(logged_in.id, user.id);
    assert_eq!(logged_in.role, Role::Weekly);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn wrong_password_and_unknown_user_fail_alike() {
    let pool = common::pool().await;
    let user = common::create_user(&pool, Role::Daily, "secret123").await;

    let wrong = User::authenticate(&pool, &user.username, "secret124").await;
    assert!(matches!(wrong, Err(AppError::Unauthorized)));

    let unknown = User::authenticate(&pool, &common::unique_username("ghost"), "secret123").await;
    assert!(matches!(unknown, Err(AppError::Unauthorized)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn inactive_user_cannot_log_in_or_validate() {
    let pool = common::pool().await;
    let user = common::create_user(&pool, Role::Yearly, "secret123").await;
    sqlx::query("UPDATE users SET is_active = false WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();

    let login = User::authenticate(&pool, &user.username, "secret123").await;
    assert!(matches!(login, Err(AppError::Unauthorized)));

    let validated = User::validate(&pool, user.id).await;
    assert!(matches!(validated, Err(AppError::Unauthorized)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_username_is_a_conflict() {
    let pool = common::pool().await;
    let user = common::create_user(&pool, Role::Daily, "secret123").await;

    let again = User::create(
        &pool,
        &RegisterRequest {
            username: user.username.clone(),
            password: "another1".into(),
            full_name: "Copy".into(),
            role: Role::Weekly,
        },
    )
    .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
}
