mod common;

use std::path::Path;
use std::sync::Arc;

use catalog_sync::error::AppError;
use catalog_sync::facade::Facade;
use catalog_sync::models::{Config, DeploymentTarget};
use catalog_sync::pipeline::{self, CancelSignal, RunOptions};
use catalog_sync::storage::{LocalStore, RunLock};
use common::{ScriptedFetcher, Step, many_rows, orchestrator, test_config};
use tempfile::TempDir;

fn healthy_catalog() -> Arc<ScriptedFetcher> {
    Arc::new(
        ScriptedFetcher::new()
            .script("2024F", "CSI", vec![Step::Pages(vec![many_rows("CSI", 3)])])
            .script("2025W", "CSI", vec![Step::Pages(vec![many_rows("CSI", 2)])]),
    )
}

fn config_with_targets(dir: &TempDir, targets: &[(&str, &Path)]) -> Config {
    let mut config = test_config(&dir.path().join("store"), &["2024F", "2025W"], &["CSI"]);
    config.deploy.targets = targets
        .iter()
        .map(|(name, path)| DeploymentTarget::new(*name, *path))
        .collect();
    config
}

fn data_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("all_courses_") && n.ends_with(".json"))
        .collect();
    names.sort();
    names
}

fn assert_mirrors(store: &Path, target: &Path) {
    let names = data_files(store);
    assert_eq!(data_files(target), names);
    for name in names {
        assert_eq!(
            std::fs::read(store.join(&name)).unwrap(),
            std::fs::read(target.join(&name)).unwrap(),
            "{name} differs"
        );
    }
}

async fn scrape_and_sync(config: &Config) -> catalog_sync::models::RunReport {
    let store = LocalStore::new(&config.storage.local_dir);
    pipeline::run_scrape_all(
        config,
        &orchestrator(config, healthy_catalog()),
        &store,
        RunOptions {
            sync: true,
            force: false,
        },
        &CancelSignal::never(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn every_target_mirrors_the_store() {
    for count in 1..=3 {
        let dir = TempDir::new().unwrap();
        let paths: Vec<_> = (0..count).map(|i| dir.path().join(format!("t{i}"))).collect();
        let names: Vec<String> = (0..count).map(|i| format!("target-{i}")).collect();
        let targets: Vec<(&str, &Path)> = names
            .iter()
            .zip(&paths)
            .map(|(n, p)| (n.as_str(), p.as_path()))
            .collect();
        let config = config_with_targets(&dir, &targets);

        let report = scrape_and_sync(&config).await;

        assert!(report.success);
        assert!(!report.sync_skipped);
        assert_eq!(report.targets_synced.len(), count);
        for path in &paths {
            assert_mirrors(&config.storage.local_dir, path);
        }
        // Run report is store metadata, not a data file
        assert!(!paths[0].join("run_report.json").exists());
    }
}

#[tokio::test]
async fn stale_target_files_are_removed() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("api");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("all_courses_2023w.json"), "{}").unwrap();
    std::fs::write(target.join("README.txt"), "keep me").unwrap();
    let config = config_with_targets(&dir, &[("api", &target)]);

    let report = scrape_and_sync(&config).await;

    assert!(report.success);
    assert!(!target.join("all_courses_2023w.json").exists());
    assert!(target.join("README.txt").exists());
    assert_mirrors(&config.storage.local_dir, &target);
}

#[tokio::test]
async fn failed_target_does_not_undo_healthy_one() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("api");
    // A regular file as parent makes the target uncreatable, even for root
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let bad = blocker.join("static");
    let config = config_with_targets(&dir, &[("api", &good), ("static", &bad)]);

    let report = scrape_and_sync(&config).await;

    assert!(!report.success);
    assert!(report.scrape_succeeded());
    assert_eq!(report.targets_synced, vec!["api"]);
    assert_eq!(report.targets_failed.len(), 1);
    assert_eq!(report.targets_failed[0].name, "static");
    assert!(matches!(
        report.ensure_synced(),
        Err(AppError::PartialSync { .. })
    ));

    assert_mirrors(&config.storage.local_dir, &good);
    assert_eq!(
        data_files(&config.storage.local_dir),
        vec!["all_courses_2024f.json", "all_courses_2025w.json"]
    );
}

#[tokio::test]
async fn deploy_syncs_existing_store() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("api");
    let mut config = config_with_targets(&dir, &[("api", &target)]);
    scrape_and_sync(&{
        let mut offline = config.clone();
        offline.deploy.targets.clear();
        offline
    })
    .await;
    assert!(!target.exists());

    let store = LocalStore::new(&config.storage.local_dir);
    let report = pipeline::run_deploy(&config, &store).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.files.len(), 2);
    assert_mirrors(&config.storage.local_dir, &target);

    config.deploy.targets.clear();
    assert!(pipeline::run_deploy(&config, &store).await.is_err());
}

#[tokio::test]
async fn deploy_without_store_fails() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("api");
    let config = config_with_targets(&dir, &[("api", &target)]);
    let store = LocalStore::new(&config.storage.local_dir);

    let err = pipeline::run_deploy(&config, &store).await.unwrap_err();
    assert!(matches!(err, AppError::StoreMissing { .. }));
    assert!(!target.exists());
}

#[tokio::test]
async fn deploy_while_locked_fails() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("api");
    let config = config_with_targets(&dir, &[("api", &target)]);
    scrape_and_sync(&config).await;
    let _held = RunLock::acquire(&config.storage.local_dir).unwrap();

    let store = LocalStore::new(&config.storage.local_dir);
    let err = pipeline::run_deploy(&config, &store).await.unwrap_err();
    assert!(matches!(err, AppError::RunInProgress { .. }));
}

#[tokio::test]
async fn facade_reports_partial_sync() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("api");
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let mut config = config_with_targets(&dir, &[("api", &good), ("static", &blocker.join("x"))]);

    let facade = Facade::new(config.clone(), orchestrator(&config, healthy_catalog()));
    let resp = facade.scrape_all().await;
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body["error"], "Sync failed");
    assert_eq!(resp.body["scrapeSucceeded"], true);
    assert_eq!(resp.body["report"]["targetsSynced"][0], "api");

    config.deploy.allow_partial = true;
    let facade = Facade::new(config.clone(), orchestrator(&config, healthy_catalog()));
    let resp = facade.scrape_all().await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["success"], false);
}

#[tokio::test]
async fn facade_scrape_all_succeeds() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("api");
    let config = config_with_targets(&dir, &[("api", &target)]);
    let facade = Facade::new(config.clone(), orchestrator(&config, healthy_catalog()));

    let resp = facade.handle("/scrape-all/", &Default::default()).await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["success"], true);
    assert_eq!(resp.body["report"]["recordsWritten"], 5);
    assert!(resp.body["timestamp"].is_string());
    assert_mirrors(&config.storage.local_dir, &target);
}

#[tokio::test]
async fn facade_scrape_all_without_data_is_500() {
    let dir = TempDir::new().unwrap();
    let config = config_with_targets(&dir, &[]);
    let facade = Facade::new(
        config.clone(),
        orchestrator(&config, Arc::new(ScriptedFetcher::new())),
    );

    let resp = facade.scrape_all().await;

    assert_eq!(resp.status, 500);
    assert_eq!(resp.body["error"], "Scrape failed");
    assert_eq!(resp.body["scrapeSucceeded"], false);
}
