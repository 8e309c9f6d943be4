use refindex::access::{BackendUser, UserGroup};

fn group(title: &str, access_deny: &str) -> UserGroup {
    UserGroup {
        title: title.to_string(),
        access_deny: access_deny.to_string(),
    }
}

#[test]
fn test_deny_list_merges_groups_in_order() {
    let user = BackendUser {
        username: "editor".to_string(),
        groups: vec![
            group("editors", " tt_content:1 , pages:5,,"),
            group("translators", "pages:5,tt_content:9"),
        ],
    };

    assert_eq!(
        user.deny_list(),
        vec!["tt_content:1", "pages:5", "pages:5", "tt_content:9"]
    );
    assert!(user.is_denied("tt_content:9"));
    assert!(!user.is_denied("tt_content:2"));
}

#[test]
fn test_deny_list_empty_without_groups() {
    let user = BackendUser {
        username: "admin".to_string(),
        groups: Vec::new(),
    };
    assert!(user.deny_list().is_empty());

    let user = BackendUser {
        username: "admin".to_string(),
        groups: vec![group("nothing", " , ")],
    };
    assert!(user.deny_list().is_empty());
}

#[test]
fn test_backend_user_from_json() {
    let user: BackendUser = serde_json::from_str(
        r#"{ "username": "jo", "groups": [ { "title": "a", "access_deny": "x,y" }, { "title": "b" } ] }"#,
    )
    .expect("should deserialize");
    assert_eq!(user.deny_list(), vec!["x", "y"]);
}
