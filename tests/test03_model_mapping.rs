use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlite_queue::prelude::*;

#[derive(Debug, PartialEq)]
struct Item {
    title: String,
}

impl Model for Item {
    const NAME: &'static str = "Item";

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[FieldSpec::new("title", FieldKind::Text)];
        FIELDS
    }

    fn from_fields(fields: &mut FieldValues) -> Result<Self, SqliteQueueError> {
        Ok(Self {
            title: fields.take("title")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Settings {
    theme: String,
    shortcuts: Vec<String>,
    limits: std::collections::BTreeMap<String, u32>,
}

#[derive(Debug, PartialEq)]
struct Profile {
    id: i64,
    name: String,
    score: f64,
    active: bool,
    joined: NaiveDateTime,
    avatar: Option<Vec<u8>>,
    settings: Settings,
}

impl Model for Profile {
    const NAME: &'static str = "Profile";

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::new("id", FieldKind::Integer),
            FieldSpec::new("name", FieldKind::Text),
            FieldSpec::new("score", FieldKind::Real),
            FieldSpec::new("active", FieldKind::Bool),
            FieldSpec::new("joined", FieldKind::Date),
            FieldSpec::new("avatar", FieldKind::Blob),
            FieldSpec::new("settings", FieldKind::Structured),
        ];
        FIELDS
    }

    fn key_map() -> KeyMap {
        KeyMap::identity()
            .with("id", "profile_id")
            .with("settings", "settings_json")
    }

    fn from_fields(fields: &mut FieldValues) -> Result<Self, SqliteQueueError> {
        Ok(Self {
            id: fields.take("id")?,
            name: fields.take("name")?,
            score: fields.take("score")?,
            active: fields.take("active")?,
            joined: fields.take("joined")?,
            avatar: fields.take("avatar")?,
            settings: fields.take_structured("settings")?,
        })
    }
}

const PROFILE_DDL: &str = "CREATE TABLE profiles (
    profile_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    score REAL,
    active BOOLEAN,
    joined DATETIME,
    avatar BLOB,
    settings_json TEXT
)";

#[test]
fn test03_key_map_translates_title_to_name() -> Result<(), Box<dyn std::error::Error>> {
    let registry = ModelRegistry::shared();
    registry.register("Item", KeyMap::identity().with("title", "name"));
    let queue = DatabaseQueue::open(EngineOptions::in_memory(), registry)?;

    let items = queue.submit_sync(|db| {
        db.execute_plain_query("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)")?;
        db.execute_query("INSERT INTO items (name) VALUES (?)", &["widget".into()])?;
        db.fetch_object::<Item>("SELECT * FROM items", &[])
    })?;
    assert_eq!(
        items,
        [Item {
            title: "widget".into()
        }]
    );
    Ok(())
}

#[test]
fn test03_structured_field_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    let registry = ModelRegistry::shared();
    registry.register_model::<Profile>();
    let mut db = Database::open_with(EngineOptions::in_memory(), registry)?;
    db.execute_plain_query(PROFILE_DDL)?;

    let settings = Settings {
        theme: "dark".into(),
        shortcuts: vec!["ctrl+k".into(), "ctrl+p".into()],
        limits: [("uploads".to_string(), 10), ("exports".to_string(), 3)]
            .into_iter()
            .collect(),
    };
    let joined = NaiveDate::from_ymd_opt(2023, 11, 5)
        .and_then(|d| d.and_hms_milli_opt(8, 30, 0, 250))
        .ok_or("bad date")?;
    db.execute_query(
        "INSERT INTO profiles (name, score, active, joined, avatar, settings_json)
         VALUES (?, ?, ?, ?, ?, ?)",
        &[
            "ada".into(),
            RowValues::Float(97.5),
            RowValues::Bool(true),
            RowValues::Timestamp(joined),
            RowValues::Null,
            RowValues::JSON(serde_json::to_value(&settings)?),
        ],
    )?;

    let profiles = db.fetch_object::<Profile>("SELECT * FROM profiles", &[])?;
    assert_eq!(
        profiles,
        [Profile {
            id: db.last_insert_id()?,
            name: "ada".into(),
            score: 97.5,
            active: true,
            joined,
            avatar: None,
            settings,
        }]
    );
    Ok(())
}

#[test]
fn test03_pretty_json_still_decodes() -> Result<(), Box<dyn std::error::Error>> {
    let registry = ModelRegistry::shared();
    registry.register_model::<Profile>();
    let mut db = Database::open_with(
        EngineOptions::builder(":memory:")
            .json_write(JsonWriteOptions { pretty: true })
            .finish(),
        registry,
    )?;
    db.execute_plain_query(PROFILE_DDL)?;
    db.execute_query(
        "INSERT INTO profiles (name, score, active, joined, settings_json)
         VALUES ('bo', 1, 'yes', 0, ?)",
        &[RowValues::JSON(
            json!({"theme": "light", "shortcuts": [], "limits": {}}),
        )],
    )?;

    let stored = db.fetch_dictionary("SELECT settings_json FROM profiles", &[])?;
    let Some(RowValues::Text(text)) = stored[0].get("settings_json") else {
        return Err("settings_json is not text".into());
    };
    assert!(text.contains('\n'));

    let profile = db
        .fetch_object::<Profile>("SELECT * FROM profiles", &[])?
        .pop()
        .ok_or("no profile")?;
    assert_eq!(profile.score, 1.0);
    assert!(profile.active);
    assert_eq!(profile.joined, NaiveDateTime::default());
    assert_eq!(profile.settings.theme, "light");
    Ok(())
}

#[test]
fn test03_uncoercible_values_are_mapping_errors() -> Result<(), Box<dyn std::error::Error>> {
    let registry = ModelRegistry::shared();
    registry.register_model::<Profile>();
    let mut db = Database::open_with(EngineOptions::in_memory(), registry)?;
    db.execute_plain_query(PROFILE_DDL)?;
    db.execute_plain_query(
        "INSERT INTO profiles (name, score, active, joined, settings_json)
         VALUES ('cy', 'lots', 1, '2024-01-01', '{}')",
    )?;
    let err = db
        .fetch_object::<Profile>("SELECT * FROM profiles", &[])
        .unwrap_err();
    assert!(matches!(err, SqliteQueueError::MappingError(ref m) if m.contains("score")));

    db.execute_plain_query("UPDATE profiles SET score = 2")?;
    let err = db
        .fetch_object::<Profile>("SELECT profile_id, name FROM profiles", &[])
        .unwrap_err();
    assert!(matches!(err, SqliteQueueError::MappingError(ref m) if m.contains("`score`")));

    let err = db
        .fetch_object::<Profile>("SELECT * FROM profiles", &[])
        .unwrap_err();
    // `{}` has no `theme`: the structured decode fails, not the coercion.
    assert!(matches!(err, SqliteQueueError::MappingError(ref m) if m.contains("settings")));
    Ok(())
}
