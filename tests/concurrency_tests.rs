// Copyright (c) 2025 - Cowboy AI, Inc.
//! Concurrent transaction tests
//!
//! Many callers share one engine. Conflicting transactions must serialize
//! without lost updates; disjoint ones must not block each other.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;

use cim_inventory::{
    AddressState, EngineConfig, EntityKind, InventoryEngine, InventoryError, NewDatacenter,
    NewHost, NewRack, NewRoom, Unavailable,
};

use fixtures::{assert_consistent, ip, site, GatedJournal};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assign_has_one_winner() {
    let site = Arc::new(site().await);
    let mut hosts = Vec::new();
    for position in 1..=8 {
        hosts.push(
            site.service_host(&format!("H{}", position), 1, position)
                .await
                .unwrap(),
        );
    }

    let attempts = hosts.iter().map(|host| {
        let site = Arc::clone(&site);
        let host = *host;
        tokio::spawn(async move { site.engine.assign_ip(site.service, ip(1), host).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|result| result.is_err()) {
        assert_eq!(
            result.clone().unwrap_err(),
            InventoryError::AddressUnavailable {
                address: ip(1),
                reason: Unavailable::Assigned,
            }
        );
    }

    let AddressState::Assigned { host } = site.entry(ip(1)).await.state else {
        panic!("address left free");
    };
    assert_eq!(site.host_record(host).await.ip, Some(ip(1)));
    site.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_hosts_in_one_rack_keep_counts() {
    let site = Arc::new(site().await);

    let creates = (1..=20u32).map(|position| {
        let site = Arc::clone(&site);
        tokio::spawn(async move { site.host(&format!("H{}", position), 2, position * 2 - 1).await })
    });
    for joined in join_all(creates).await {
        joined.unwrap().unwrap();
    }

    let rack = site.rack_record(site.rack).await;
    assert_eq!(rack.hosts_count, 20);
    assert_eq!(rack.capacity, 2);
    assert_eq!(site.room_record(site.room).await.hosts_count, 20);
    site.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_slot_has_one_winner() {
    let site = Arc::new(site().await);

    let creates = (0..6).map(|i| {
        let site = Arc::clone(&site);
        tokio::spawn(async move { site.host(&format!("H{}", i), 2, 10).await })
    });
    let results: Vec<_> = join_all(creates)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, InventoryError::SlotConflict { .. })));
    site.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_names_have_one_winner() {
    let engine = Arc::new(InventoryEngine::new(EngineConfig::default()).unwrap());

    let creates = (0..6).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.create_datacenter(NewDatacenter::new("D1")).await })
    });
    let results: Vec<_> = join_all(creates)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(engine.snapshot().await.datacenters().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_datacenters_proceed_in_parallel() {
    let mut config = EngineConfig::default();
    config.lock_timeout_ms = 2_000;
    let engine = Arc::new(InventoryEngine::new(config).unwrap());

    let builds = (0..8).map(|i| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let dc = engine
                .create_datacenter(NewDatacenter::new(format!("D{}", i)))
                .await?;
            let room = engine.create_room(NewRoom::new(format!("R{}", i), dc)).await?;
            let rack = engine.create_rack(NewRack::new(format!("K{}", i), room)).await?;
            for position in 1..=4 {
                engine
                    .create_host(NewHost::new(format!("H{}-{}", i, position), rack, 1).at(position))
                    .await?;
            }
            Ok::<_, InventoryError>(dc)
        })
    });

    let finished = tokio::time::timeout(Duration::from_secs(10), join_all(builds))
        .await
        .expect("disjoint builds finish");
    for joined in finished {
        joined.unwrap().unwrap();
    }

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.hosts().count(), 32);
    assert!(snapshot.datacenters().all(|dc| dc.hosts_count == 4));
    assert_consistent(&engine).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_races_with_host_create() {
    let site = Arc::new(site().await);
    site.host("H0", 1, 1).await.unwrap();

    let creator = {
        let site = Arc::clone(&site);
        tokio::spawn(async move { site.host("H1", 1, 5).await })
    };
    let deleter = {
        let site = Arc::clone(&site);
        tokio::spawn(async move { site.engine.delete_entity(site.rack.into()).await })
    };

    let created = creator.await.unwrap();
    deleter.await.unwrap().unwrap();

    // Either the host landed before the delete or it found no rack.
    if let Err(err) = created {
        assert!(matches!(err, InventoryError::NotFound(_)));
    }
    assert_eq!(site.engine.snapshot().await.hosts().count(), 0);
    site.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pending_journal_append_does_not_block_other_work() {
    let journal = GatedJournal::new();
    let engine = Arc::new(
        InventoryEngine::open(EngineConfig::default(), journal.clone())
            .await
            .unwrap(),
    );
    let d0 = engine
        .create_datacenter(NewDatacenter::new("D0"))
        .await
        .unwrap();

    journal.hold();
    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.create_datacenter(NewDatacenter::new("D1")).await })
    };
    journal.entered().await;

    // Reads and planning in another datacenter run while D1 is being journaled.
    let version = tokio::time::timeout(Duration::from_secs(1), engine.version())
        .await
        .expect("reader waited on journal I/O");
    assert_eq!(version, 1);
    let pending = tokio::time::timeout(
        Duration::from_secs(1),
        engine.find_by_name(EntityKind::Datacenter, "D1"),
    )
    .await
    .expect("lookup waited on journal I/O");
    assert!(matches!(pending, Err(InventoryError::NameNotFound { .. })));

    let planner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.create_room(NewRoom::new("R0", d0)).await })
    };

    journal.release();
    writer.await.unwrap().unwrap();
    planner.await.unwrap().unwrap();

    assert_eq!(engine.version().await, 3);
    assert_consistent(&engine).await;
}
