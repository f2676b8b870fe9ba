use lyricat_engine::providers::{MockResponse, MockScoreSource};
use lyricat_engine::{
    Catalog, ChartKind, EngineConfig, EngineError, Era, RatingEngine, SessionToken,
};
use std::sync::Arc;

const SHEET: &str = r#"
MonoBehaviour:
  m_Name: SongLib
  dataArray:
  - index: 1
    songname: Opening
    updateversion: 1.0.0
    diffe: 2.0
    diffn: 5.0
    diffh: 8.0
    diffm: 11.0
    diffsp: -1
  - index: 2
    songname: Second
    updateversion: 2.1.0
    diffe: 3.0
    diffn: 6.0
    diffh: 9.0
    diffm: 12.0
    diffsp: 15.0
  - index: 3
    songname: Latest
    updateversion: 3.0.0
    diffe: 2.5
    diffn: 5.5
    diffh: 8.5
    diffm: 11.5
    diffsp: -1
  - index: 4
    songname: Also Latest
    updateversion: 3.2.1
    diffe: 1.0
    diffn: 4.0
    diffh: 7.0
    diffm: 10.0
    diffsp: -1
"#;

fn engine(mock: MockScoreSource) -> (RatingEngine, Arc<MockScoreSource>) {
    let catalog = Arc::new(Catalog::from_yaml_str(SHEET).unwrap());
    let mock = Arc::new(mock);
    let config = EngineConfig {
        workers: 2,
        ..EngineConfig::default()
    };
    (RatingEngine::from_config(catalog, mock.clone(), &config), mock)
}

fn token() -> SessionToken {
    SessionToken::new("r:engine")
}

#[test]
fn test_catalog_eras() {
    let catalog = Catalog::from_yaml_str(SHEET).unwrap();
    assert_eq!(catalog.max_major(), 3);
    assert_eq!(catalog.candidates(Era::Old).len(), 8);
    assert_eq!(catalog.candidates(Era::New).len(), 8);
    assert!(catalog
        .candidates(Era::Old)
        .iter()
        .all(|c| c.difficulty < 15.0));
}

#[tokio::test]
async fn test_best_lists() {
    let (engine, _) = engine(
        MockScoreSource::new()
            .with_score(1, ChartKind::Master, 1_000_000)
            .with_score(2, ChartKind::Hard, 990_000)
            .with_score(3, ChartKind::Master, 980_000)
            .with_score(4, ChartKind::Hard, 1_000_000),
    );

    let old = engine.best_old(&token()).await.unwrap();
    assert_eq!(old.len(), 2);
    assert_eq!((old[0].song_id, old[0].chart, old[0].rating), (1, ChartKind::Master, 13.0));
    assert_eq!((old[1].song_id, old[1].chart, old[1].rating), (2, ChartKind::Hard, 10.5));

    let new = engine.best_new(&token()).await.unwrap();
    assert_eq!(new.len(), 2);
    assert_eq!((new[0].song_id, new[0].rating), (3, 12.5));
    assert_eq!((new[1].song_id, new[1].rating), (4, 9.0));
}

#[tokio::test]
async fn test_player_rating() {
    let (engine, _) = engine(MockScoreSource::new().with_default(MockResponse::Score(1_000_000)));

    let rating = engine.player_rating(&token()).await.unwrap();
    // Old: 14 + 13, new: 13.5 + 12
    assert_eq!(rating.old_contribution, 0.54);
    assert_eq!(rating.new_contribution, 0.51);
    assert_eq!(rating.rating, 1.05);
    assert!(rating.best_old.iter().all(|e| e.chart == ChartKind::Master));
}

#[tokio::test]
async fn test_timeouts_only_cost_their_chart() {
    let (engine, _) = engine(
        MockScoreSource::new()
            .with_default(MockResponse::Score(1_000_000))
            .with_response(3, ChartKind::Master, MockResponse::Timeout),
    );

    let new = engine.best_new(&token()).await.unwrap();
    // Song 3 falls back to its Hard chart
    assert_eq!((new[0].song_id, new[0].chart, new[0].rating), (4, ChartKind::Master, 12.0));
    assert_eq!((new[1].song_id, new[1].chart, new[1].rating), (3, ChartKind::Hard, 10.5));
}

#[tokio::test]
async fn test_fatal_error_fails_rating() {
    let (engine, _) = engine(
        MockScoreSource::new()
            .with_default(MockResponse::Score(1_000_000))
            .with_response(1, ChartKind::Master, MockResponse::Malformed),
    );

    let err = engine.player_rating(&token()).await.unwrap_err();
    assert!(matches!(err, EngineError::BadUpstreamResponse(_)));
}

#[tokio::test]
async fn test_untouched_account() {
    let (engine, mock) = engine(MockScoreSource::new());

    let rating = engine.player_rating(&token()).await.unwrap();
    assert!(rating.best_old.is_empty());
    assert!(rating.best_new.is_empty());
    assert_eq!(rating.rating, 0.0);
    assert_eq!(mock.call_count(), 16);
}
