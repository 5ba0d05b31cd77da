use image::{DynamicImage, Rgba, RgbaImage};
use quickskin_core::asset::{AssetCache, PngCodec, SqliteBlobStore};
use quickskin_core::db::{DbError, RelationalStore};
use quickskin_core::model::{AssetId, NewCategory, ReleaseItem, Tint, DEFAULT_CATEGORY_ID};
use quickskin_core::repo::{RepoError, CATEGORY_TABLE};
use quickskin_core::service::{CategoryError, CategoryStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

struct Fixture {
    _dir: TempDir,
    _runtime: Runtime,
    db_path: PathBuf,
    assets: Arc<AssetCache>,
    categories: CategoryStore,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Runtime::new().unwrap();
    let assets = Arc::new(AssetCache::new(
        Arc::new(SqliteBlobStore::new(dir.path().join("base.db"))),
        Arc::new(PngCodec),
        runtime.handle().clone(),
        8,
    ));
    let db_path = dir.path().join("workspace_1").join("category.db");
    let categories = CategoryStore::new(&db_path, Arc::clone(&assets));

    Fixture {
        _dir: dir,
        _runtime: runtime,
        db_path,
        assets,
        categories,
    }
}

fn icon(value: u8) -> DynamicImage {
    let mut pixels = RgbaImage::new(3, 3);
    pixels.put_pixel(0, 0, Rgba([value, value, 0, 255]));
    DynamicImage::ImageRgba8(pixels)
}

fn item_table_count(db_path: &Path) -> usize {
    let store = RelationalStore::open(db_path).unwrap();
    store
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name != :catalog;",
            &[("catalog", rusqlite::types::Value::Text(CATEGORY_TABLE.to_string()))],
        )
        .unwrap()
        .len()
}

#[test]
fn ensure_default_category_is_idempotent() {
    let fx = fixture();

    let first = fx.categories.ensure_default_category().unwrap();
    let second = fx.categories.ensure_default_category().unwrap();

    assert_eq!(first, second);
    assert!(first.is_default());
    assert_eq!(fx.categories.list_categories().unwrap().len(), 1);
    assert_eq!(item_table_count(&fx.db_path), 1);
}

#[test]
fn ensure_default_category_recreates_a_dropped_item_table() {
    let fx = fixture();
    fx.categories.ensure_default_category().unwrap();
    RelationalStore::open(&fx.db_path)
        .unwrap()
        .drop_table_if_exists(DEFAULT_CATEGORY_ID)
        .unwrap();

    fx.categories.ensure_default_category().unwrap();

    let store = RelationalStore::open(&fx.db_path).unwrap();
    assert!(store.table_exists(DEFAULT_CATEGORY_ID).unwrap());
    assert!(fx
        .categories
        .list_release_items(DEFAULT_CATEGORY_ID)
        .unwrap()
        .is_empty());
}

#[test]
fn create_then_delete_restores_membership_and_drops_table() {
    let fx = fixture();
    fx.categories.ensure_default_category().unwrap();
    let before = fx.categories.list_categories().unwrap();

    let created = fx
        .categories
        .create_category(NewCategory {
            name: "  Skins ".to_string(),
            icon_tint: Some("#3366ff".to_string()),
            ..NewCategory::default()
        })
        .unwrap();
    assert_eq!(created.name, "Skins");
    assert_eq!(created.icon_tint, Some(Tint::rgb(0x33, 0x66, 0xff)));
    assert_eq!(
        fx.categories.category_id_by_name("Skins").unwrap(),
        Some(created.id.clone())
    );
    assert_eq!(item_table_count(&fx.db_path), 2);

    let reselect = fx.categories.delete_category(&created.id, None).unwrap();
    assert_eq!(reselect, None);
    assert_eq!(fx.categories.list_categories().unwrap(), before);

    let store = RelationalStore::open(&fx.db_path).unwrap();
    let err = store
        .query(&format!("SELECT * FROM \"{}\";", created.id), &[])
        .unwrap_err();
    assert!(matches!(err, DbError::Statement { .. }));
}

#[test]
fn delete_category_cascades_to_item_icons() {
    let fx = fixture();
    let category = fx
        .categories
        .create_category(NewCategory::named("Posters"))
        .unwrap();
    fx.categories
        .add_release_item(&category.id, ReleaseItem::new("Spring"))
        .unwrap();
    let icon_id = fx
        .categories
        .set_release_item_icon(&category.id, "Spring", Some(icon(40)))
        .unwrap()
        .unwrap();
    assert!(fx.assets.exists(&icon_id).unwrap());

    fx.categories.delete_category(&category.id, None).unwrap();

    assert!(!fx.assets.exists(&icon_id).unwrap());
    let resolved = fx.assets.resolve(&icon_id);
    assert!(resolved.is_not_found());
    assert!(Arc::ptr_eq(resolved.image(), &fx.assets.placeholders().not_found));

    let err = fx
        .categories
        .list_release_items(&category.id)
        .unwrap_err();
    assert!(matches!(err, CategoryError::CategoryNotFound(_)));
    let store = RelationalStore::open(&fx.db_path).unwrap();
    assert!(matches!(
        store.query(&format!("SELECT * FROM \"{}\";", category.id), &[]),
        Err(DbError::Statement { .. })
    ));
}

#[test]
fn deleting_the_current_selection_returns_the_default_category() {
    let fx = fixture();
    let category = fx
        .categories
        .create_category(NewCategory::named("Current"))
        .unwrap();

    let next = fx
        .categories
        .delete_category(&category.id, Some(category.id.as_str()))
        .unwrap()
        .unwrap();
    assert!(next.is_default());

    let again = fx
        .categories
        .delete_category(DEFAULT_CATEGORY_ID, Some(DEFAULT_CATEGORY_ID))
        .unwrap()
        .unwrap();
    assert!(again.is_default());
    assert_eq!(fx.categories.list_categories().unwrap(), vec![again]);
}

#[test]
fn release_item_lifecycle() {
    let fx = fixture();
    fx.categories.ensure_default_category().unwrap();

    let item = ReleaseItem::new("Summer").with_description("beach");
    fx.categories
        .add_release_item(DEFAULT_CATEGORY_ID, item.clone())
        .unwrap();
    assert_eq!(
        fx.categories.list_release_items(DEFAULT_CATEGORY_ID).unwrap(),
        vec![item.clone()]
    );

    let edited = ReleaseItem::new("Summer").with_description("sunset");
    fx.categories
        .update_release_item(DEFAULT_CATEGORY_ID, &edited)
        .unwrap();
    assert_eq!(
        fx.categories
            .get_release_item(DEFAULT_CATEGORY_ID, "Summer")
            .unwrap(),
        Some(edited)
    );

    let icon_id = fx
        .categories
        .set_release_item_icon(DEFAULT_CATEGORY_ID, "Summer", Some(icon(1)))
        .unwrap()
        .unwrap();
    let replaced = fx
        .categories
        .set_release_item_icon(DEFAULT_CATEGORY_ID, "Summer", Some(icon(2)))
        .unwrap();
    assert_eq!(replaced, Some(icon_id.clone()));

    assert!(fx
        .categories
        .delete_release_item(DEFAULT_CATEGORY_ID, "Summer")
        .unwrap());
    assert!(!fx.assets.exists(&icon_id).unwrap());
    assert!(!fx
        .categories
        .delete_release_item(DEFAULT_CATEGORY_ID, "Summer")
        .unwrap());
}

#[test]
fn release_item_names_are_stored_trimmed() {
    let fx = fixture();
    fx.categories.ensure_default_category().unwrap();

    let added = fx
        .categories
        .add_release_item(DEFAULT_CATEGORY_ID, ReleaseItem::new("  Autumn "))
        .unwrap();
    assert_eq!(added.name, "Autumn");
    assert_eq!(
        fx.categories
            .get_release_item(DEFAULT_CATEGORY_ID, "Autumn")
            .unwrap(),
        Some(added)
    );

    let duplicate = fx
        .categories
        .add_release_item(DEFAULT_CATEGORY_ID, ReleaseItem::new("Autumn  "))
        .unwrap_err();
    assert!(matches!(duplicate, CategoryError::DuplicateItem { .. }));
}

#[test]
fn clearing_an_item_icon_unlinks_and_deletes_the_asset() {
    let fx = fixture();
    fx.categories.ensure_default_category().unwrap();
    fx.categories
        .add_release_item(DEFAULT_CATEGORY_ID, ReleaseItem::new("Night"))
        .unwrap();
    let icon_id = fx
        .categories
        .set_release_item_icon(DEFAULT_CATEGORY_ID, "Night", Some(icon(9)))
        .unwrap()
        .unwrap();

    let cleared = fx
        .categories
        .set_release_item_icon(DEFAULT_CATEGORY_ID, "Night", None)
        .unwrap();
    assert_eq!(cleared, None);
    assert!(!fx.assets.exists(&icon_id).unwrap());
    let item = fx
        .categories
        .get_release_item(DEFAULT_CATEGORY_ID, "Night")
        .unwrap()
        .unwrap();
    assert_eq!(item.icon_asset_id, None);
}

#[test]
fn invalid_input_is_rejected_before_any_write() {
    let fx = fixture();
    fx.categories.ensure_default_category().unwrap();

    let blank = fx
        .categories
        .create_category(NewCategory::named("   "))
        .unwrap_err();
    assert!(matches!(blank, CategoryError::BlankName));

    let tint = fx
        .categories
        .create_category(NewCategory {
            name: "Tinted".to_string(),
            icon_tint: Some("blue".to_string()),
            ..NewCategory::default()
        })
        .unwrap_err();
    assert!(matches!(tint, CategoryError::InvalidTint(_)));
    assert_eq!(fx.categories.list_categories().unwrap().len(), 1);

    fx.categories
        .add_release_item(DEFAULT_CATEGORY_ID, ReleaseItem::new("Dup"))
        .unwrap();
    let duplicate = fx
        .categories
        .add_release_item(DEFAULT_CATEGORY_ID, ReleaseItem::new("Dup"))
        .unwrap_err();
    assert!(duplicate.is_validation());

    let dangling = ReleaseItem {
        icon_asset_id: Some(AssetId::new("never-stored")),
        ..ReleaseItem::new("Dangling")
    };
    let missing = fx
        .categories
        .add_release_item(DEFAULT_CATEGORY_ID, dangling)
        .unwrap_err();
    assert!(matches!(missing, CategoryError::MissingIconAsset(_)));
    assert_eq!(
        fx.categories
            .list_release_items(DEFAULT_CATEGORY_ID)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn missing_targets_report_not_found() {
    let fx = fixture();
    fx.categories.ensure_default_category().unwrap();

    assert!(matches!(
        fx.categories.delete_category("category_missing", None),
        Err(CategoryError::CategoryNotFound(_))
    ));
    assert!(matches!(
        fx.categories
            .update_release_item(DEFAULT_CATEGORY_ID, &ReleaseItem::new("ghost")),
        Err(CategoryError::ItemNotFound { .. })
    ));
    assert!(matches!(
        fx.categories
            .set_release_item_icon(DEFAULT_CATEGORY_ID, "ghost", None),
        Err(CategoryError::ItemNotFound { .. })
    ));

    let mut renamed = fx.categories.ensure_default_category().unwrap();
    renamed.id = "category_gone".to_string();
    assert!(matches!(
        fx.categories.update_category(&renamed),
        Err(CategoryError::CategoryNotFound(_))
    ));
}

#[test]
fn corrupt_category_rows_surface_as_data_integrity_errors() {
    let fx = fixture();
    fx.categories.ensure_default_category().unwrap();
    RelationalStore::open(&fx.db_path)
        .unwrap()
        .update(
            CATEGORY_TABLE,
            &[("icon_tint", rusqlite::types::Value::Text("not-a-color".to_string()))],
            "id = :id",
            &[("id", rusqlite::types::Value::Text(DEFAULT_CATEGORY_ID.to_string()))],
        )
        .unwrap();

    assert!(matches!(
        fx.categories.list_categories(),
        Err(CategoryError::Repo(RepoError::DataIntegrity { .. }))
    ));
}
