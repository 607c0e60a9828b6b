use rkl_recon::comment_store::{
    init_schema, insert_posts, load_posts, load_thread, open_db, parse_posts_json,
};
use rusqlite::Connection;

const POSTS: &str = r#"[
  {"id": 1, "thread_id": 1, "created_at": "2025-03-04T23:30:00Z", "text": "Jammers vs Outlaws"},
  {"id": 2, "thread_id": 1, "parent_id": 1, "created_at": "2025-03-05T01:00:00Z", "text": "@a\n@b\nvs\n@c"},
  {"id": 3, "thread_id": 3, "created_at": "2025-03-06T12:00:00Z"}
]"#;

fn store() -> Connection {
    let mut conn = Connection::open_in_memory().expect("in-memory db");
    init_schema(&conn).expect("schema");
    let posts = parse_posts_json(POSTS).expect("posts json");
    assert_eq!(insert_posts(&mut conn, &posts).expect("insert"), 3);
    conn
}

#[test]
fn posts_round_trip_with_optional_fields() {
    let conn = store();
    let posts = load_posts(&conn, None, None).expect("load");
    assert_eq!(posts.len(), 3);
    assert_eq!(posts[0].id, 1);
    assert_eq!(posts[1].parent_id, Some(1));
    assert_eq!(posts[1].text, "@a\n@b\nvs\n@c");
    assert_eq!(posts[2].text, "");
}

#[test]
fn date_range_is_start_inclusive_end_exclusive() {
    let conn = store();
    let posts = load_posts(&conn, Some("2025-03-05"), Some("2025-03-06")).expect("load");
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn thread_lookup_and_upsert() {
    let mut conn = store();
    assert_eq!(load_thread(&conn, 1).expect("thread").len(), 2);

    let mut edited = parse_posts_json(POSTS).expect("posts json");
    edited.truncate(1);
    edited[0].text = "edited".to_string();
    insert_posts(&mut conn, &edited).expect("upsert");
    let thread = load_thread(&conn, 1).expect("thread");
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].text, "edited");

    init_schema(&conn).expect("schema creation is repeatable");
}

#[test]
fn open_db_creates_parent_dirs_and_reports_blocked_ones() {
    let root = std::env::temp_dir().join(format!("rkl_recon_store_{}", uuid::Uuid::new_v4()));
    let db_path = root.join("nested").join("comments.sqlite");
    let conn = open_db(&db_path).expect("open with fresh parent dirs");
    assert!(load_posts(&conn, None, None).expect("empty store").is_empty());
    drop(conn);

    let blocker = root.join("blocker");
    std::fs::write(&blocker, "not a directory").expect("write blocker file");
    let err = open_db(&blocker.join("comments.sqlite")).expect_err("parent is a file");
    assert!(format!("{err:#}").contains("create db directory"));

    std::fs::remove_dir_all(&root).ok();
}
