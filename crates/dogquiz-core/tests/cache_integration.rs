//! Cache-first behavior against an on-disk record store

mod common;

use chrono::{Duration, Utc};
use common::{letter_key, open_store, repository, FakeDogApi};
use dogquiz_core::{
    BreedRecord, CoreError, DataSource, Difficulty, RecordStore, RemoteBreed,
};
use std::sync::Arc;

fn stale_record(key: &str) -> BreedRecord {
    let mut record = BreedRecord::new(key, None, key, Utc::now(), Duration::days(7));
    record.cached_at = record.cached_at - Duration::days(8);
    record.expires_at = record.cached_at + Duration::days(7);
    record
}

#[tokio::test]
async fn test_listing_is_capped_and_served_from_cache() {
    let (_dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(60));
    let repo = repository(Arc::clone(&store), Arc::clone(&api));

    let first = repo.get_all_breeds_with_source(false).await;
    assert_eq!(first.source, DataSource::Network);
    assert_eq!(first.breeds.len(), 50);
    assert_eq!(store.breed_count().unwrap(), 50);
    assert_eq!(api.listing_calls(), 1);

    let second = repo.get_all_breeds_with_source(false).await;
    assert_eq!(second.source, DataSource::Cache);
    assert_eq!(second.breeds.len(), 50);
    assert_eq!(api.listing_calls(), 1);
}

#[tokio::test]
async fn test_stale_breeds_served_when_upstream_fails() {
    let (_dir, store) = open_store();
    for key in ["pug", "beagle", "akita"] {
        store.upsert_breed(&stale_record(key)).unwrap();
    }
    let api = Arc::new(FakeDogApi::with_generated(10));
    api.set_failing(true);
    let repo = repository(Arc::clone(&store), api);

    let load = repo.get_all_breeds_with_source(false).await;
    assert_eq!(load.source, DataSource::Stale);
    assert_eq!(load.breeds.len(), 3);
    assert_eq!(repo.last_source(), Some(DataSource::Stale));
}

#[tokio::test]
async fn test_builtin_breeds_when_nothing_cached() {
    let (_dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(10));
    api.set_failing(true);
    let repo = repository(Arc::clone(&store), api);

    let load = repo.get_all_breeds_with_source(false).await;
    assert_eq!(load.source, DataSource::Static);
    assert!(load.breeds.len() >= 2);
    // built-in data is served, not written
    assert_eq!(store.breed_count().unwrap(), 0);
}

#[tokio::test]
async fn test_forced_refresh_with_unmappable_listing_falls_back() {
    let (_dir, store) = open_store();
    let now = Utc::now();
    for key in ["pug", "beagle"] {
        store
            .upsert_breed(&BreedRecord::new(key, None, key, now, Duration::days(7)))
            .unwrap();
    }
    let api = Arc::new(FakeDogApi::new(vec![
        RemoteBreed::new("Bad-Key", vec![]),
        RemoteBreed::new("", vec![]),
    ]));
    let repo = repository(Arc::clone(&store), Arc::clone(&api));

    let load = repo.get_all_breeds_with_source(true).await;
    assert_eq!(api.listing_calls(), 1);
    assert_eq!(load.source, DataSource::Stale);
    assert_eq!(load.breeds.len(), 2);
}

#[tokio::test]
async fn test_cache_survives_reopen() {
    let (dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(5));
    repository(store, Arc::clone(&api)).get_all_breeds(false).await;

    let reopened = Arc::new(RecordStore::open(dir.path()).unwrap());
    let repo = repository(reopened, Arc::clone(&api));
    let load = repo.get_all_breeds_with_source(false).await;

    assert_eq!(load.source, DataSource::Cache);
    assert_eq!(load.breeds.len(), 5);
    assert_eq!(api.listing_calls(), 1);
}

#[tokio::test]
async fn test_favorites_survive_refresh() {
    let (_dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(4));
    let repo = repository(store, api);
    repo.get_all_breeds(false).await;

    let id = letter_key(2);
    repo.set_favorite(&id, true).unwrap();
    repo.get_all_breeds(true).await;

    let favorites = repo.get_favorites().unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].id(), id);
}

#[tokio::test]
async fn test_unknown_favorite_is_an_error() {
    let (_dir, store) = open_store();
    let repo = repository(store, Arc::new(FakeDogApi::with_generated(1)));

    let err = repo.set_favorite("nosuchbreed", true).unwrap_err();
    assert!(matches!(err, CoreError::BreedNotFound { .. }));
}

#[tokio::test]
async fn test_primary_image_cached_once() {
    let (_dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(3));
    let repo = repository(Arc::clone(&store), Arc::clone(&api));
    repo.get_all_breeds(false).await;

    let id = letter_key(0);
    let first = repo.load_image(&id).await.unwrap();
    let second = repo.load_image(&id).await.unwrap();

    assert_eq!(api.image_calls(), 1);
    assert_eq!(first.image_url, second.image_url);
    assert_eq!(store.total_image_bytes().unwrap(), 4096);

    let image = store.primary_image(&id).unwrap().unwrap();
    assert_eq!(image.access_count, 1);
}

#[tokio::test]
async fn test_image_fetch_failure_keeps_breed() {
    let (_dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(3));
    let repo = repository(store, Arc::clone(&api));
    repo.get_all_breeds(false).await;

    api.set_failing(true);
    let breed = repo.load_image(&letter_key(1)).await.unwrap();
    assert_eq!(breed.image_url, None);
    assert!(repo.load_image("nosuchbreed").await.is_none());
}

#[tokio::test]
async fn test_gallery_respects_per_breed_cap() {
    let (_dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(2));
    let repo = repository(Arc::clone(&store), Arc::clone(&api));
    repo.get_all_breeds(false).await;

    let id = letter_key(0);
    repo.load_image(&id).await;
    let gallery = repo.load_gallery(&id, 20).await.unwrap();

    assert_eq!(gallery.len(), 4);
    assert_eq!(store.images_for_breed(&id).unwrap().len(), 5);
    assert_eq!(store.primary_image_count(&id).unwrap(), 1);
    assert_eq!(store.total_image_bytes().unwrap(), 5 * 4096);
}

#[tokio::test]
async fn test_statistics_track_hits_and_misses() {
    let (_dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(3));
    let repo = repository(store, api);

    repo.get_all_breeds(false).await;
    repo.get_all_breeds(false).await;
    repo.get_all_breeds(false).await;

    let stats = repo
        .stats()
        .cache_stats(repo.config(), Utc::now())
        .unwrap();
    assert_eq!(stats.breeds.hits, 2);
    assert_eq!(stats.breeds.misses, 1);
    assert_eq!(stats.breeds.items_cached, 3);
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_quiz_from_cached_breeds() {
    let (_dir, store) = open_store();
    let api = Arc::new(FakeDogApi::with_generated(8));
    let repo = repository(store, Arc::clone(&api));

    let quiz = repo
        .generate_quiz_set(Some(Difficulty::Medium), 6)
        .await
        .unwrap();

    assert_eq!(quiz.len(), 6);
    for question in &quiz {
        assert_eq!(question.options.len(), 4);
        assert_eq!(question.correct_answer(), question.options[question.correct_index]);
        assert!(question.image_url.is_some());
    }
    assert_eq!(api.listing_calls(), 1);
}

#[tokio::test]
async fn test_quiz_fails_without_enough_breeds() {
    let (_dir, store) = open_store();
    store.upsert_breed(&stale_record("pug")).unwrap();
    let api = Arc::new(FakeDogApi::with_generated(0));
    api.set_failing(true);
    let repo = repository(store, Arc::clone(&api));

    let err = repo.generate_quiz_set(None, 3).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::InsufficientData {
            needed: 4,
            found: 1,
            attempts: 3
        }
    ));
    assert_eq!(api.listing_calls(), 3);
}
