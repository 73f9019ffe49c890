use tokio_test::assert_ok;

use rental_desk::db::DatabasePool;
use rental_desk::models::{Theme, User};
use rental_desk::services::SessionStore;

async fn open(url: &str) -> SessionStore {
    let db = DatabasePool::connect(url).await.unwrap();
    db.migrate().await.unwrap();
    SessionStore::load(db).await.unwrap()
}

#[tokio::test]
async fn session_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("desk.db").display());

    let user = User {
        id: 3,
        username: "desk".to_string(),
        staff_code: Some("STF3".to_string()),
        created_at: None,
        updated_at: None,
    };

    {
        let store = open(&url).await;
        assert_ok!(store.sign_in("tok-9".to_string(), Some(user.clone())).await);
        assert_ok!(store.set_theme(Theme::Dark).await);
        store.set_nav_item("reservations", true).await;
    }

    let store = open(&url).await;
    let state = store.snapshot().await;
    assert_eq!(state.access_token.as_deref(), Some("tok-9"));
    assert_eq!(state.user, Some(user));
    assert_eq!(state.theme, Theme::Dark);
    // nav state lives in memory only
    assert!(state.nav_items.is_empty());

    assert_ok!(store.clear_credentials().await);
    drop(store);

    let store = open(&url).await;
    assert!(!store.is_authenticated().await);
    assert_eq!(store.user().await, None);
    assert_eq!(store.theme().await, Theme::Dark);
}
