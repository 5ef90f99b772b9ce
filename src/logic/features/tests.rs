//! Integration tests for the feature pipeline
//!
//! Packet -> transform -> ensemble, with stub models.

use crate::constants::COMBINED_SCORE_FEATURE;
use crate::logic::artifacts::{ArtifactStore, FittedNormalizer, WeightTable};
use crate::logic::error::{LoopFatalError, TransformError};
use crate::logic::features::layout::{feature_range, SYNTHESIS_TABLE};
use crate::logic::features::{transform, ChannelSource, FeatureVector, PacketSource, SyntheticSource};
use crate::logic::model::{self, RegisteredModel};
use crate::logic::testing::{self, StubModel, WEIGHTED};

fn packet(items: &[(&str, f64)]) -> FeatureVector {
    items.iter().map(|(n, v)| (n.to_string(), *v)).collect()
}

#[test]
fn test_partial_packets_never_fail() {
    let store = testing::stub_store(&[0.3]);

    let partials = [
        packet(&[]),
        packet(&[("Flow Duration", 5_000.0)]),
        packet(&[("SYN Flag Count", 1.0), ("Idle Mean", 42.0)]),
        packet(&[("Something Else", 7.0)]),
    ];

    for p in &partials {
        let input = transform(p, &store).expect("partial packet must transform");
        assert_eq!(input.len(), store.selected_features().len());
    }

    // selected: Flow Duration, ACK Flag Count, score, Idle Mean
    let input = transform(&partials[2], &store).unwrap();
    assert_eq!(input.values()[0], 0.0);
    assert_eq!(input.values()[1], 0.0);
    assert_eq!(input.values()[3], 42.0);
}

#[test]
fn test_identity_score_is_raw_dot_product() {
    let store = testing::stub_store(&[0.3]);
    let p = packet(&[
        ("Flow Duration", 1_234.0),
        ("Flow Bytes/s", 98_765.5),
        ("SYN Flag Count", 1.0),
    ]);

    let raw: Vec<f64> = WEIGHTED.iter().map(|(n, _)| p.resolve(n)).collect();
    let expected: f64 = raw.iter().zip(WEIGHTED).map(|(x, (_, w))| x * w).sum();

    let input = transform(&p, &store).unwrap();
    assert_eq!(input.combined_score(), expected);
    assert_eq!(input.values()[2], expected);
}

#[test]
fn test_normalizer_applied_before_score() {
    let normalizer = FittedNormalizer::MinMax {
        min: vec![0.0; 4],
        max: vec![10.0; 4],
    };
    let store = ArtifactStore::from_parts(
        testing::weight_table(),
        normalizer,
        testing::selected(),
        vec![RegisteredModel::new("Model 1", StubModel(0.1))],
    )
    .unwrap();

    let p = packet(&[("Flow Duration", 5.0)]);
    let input = transform(&p, &store).unwrap();

    // 0.5 normalized * 0.4 weight; raw value still projected as-is
    assert!((input.combined_score() - 0.2).abs() < 1e-12);
    assert_eq!(input.values()[0], 5.0);
}

#[test]
fn test_derived_score_shadows_packet_value() {
    let store = testing::stub_store(&[0.3]);
    let p = packet(&[(COMBINED_SCORE_FEATURE, 999.0), ("Flow Duration", 10.0)]);

    let input = transform(&p, &store).unwrap();
    assert_eq!(input.values()[2], 4.0);
}

#[test]
fn test_non_finite_score_rejected() {
    let store = ArtifactStore::from_parts(
        WeightTable::new(vec![("Flow Bytes/s".to_string(), 1e308)]).unwrap(),
        FittedNormalizer::Identity { dimension: 1 },
        vec!["Flow Bytes/s".to_string()],
        vec![RegisteredModel::new("Model 1", StubModel(0.1))],
    )
    .unwrap();

    let p = packet(&[("Flow Bytes/s", 1e308)]);
    assert!(matches!(transform(&p, &store), Err(TransformError::NonFiniteScore(_))));
}

#[test]
fn test_synthesized_packets_cover_model_features() {
    let store = testing::stub_store(&[0.3]);
    let mut source = SyntheticSource::with_seed(&store, 7);

    for _ in 0..50 {
        let p = source.synthesize();

        for name in store.selected_features() {
            if name != COMBINED_SCORE_FEATURE {
                assert!(p.contains(name), "missing {}", name);
            }
        }
        for name in store.weights().names() {
            assert!(p.contains(name), "missing {}", name);
        }
        assert_eq!(p.get("Unmapped Feature"), Some(0.0));

        for (name, _) in SYNTHESIS_TABLE {
            let value = p.get(name).unwrap();
            assert!(feature_range(name).unwrap().contains(value), "{} = {}", name, value);
        }

        assert!(transform(&p, &store).is_ok());
    }
}

#[test]
fn test_seeded_synthesis_is_reproducible() {
    let store = testing::stub_store(&[0.3]);
    let mut a = SyntheticSource::with_seed(&store, 42);
    let mut b = SyntheticSource::with_seed(&store, 42);

    assert_eq!(a.synthesize(), b.synthesize());
}

#[test]
fn test_pipeline_is_deterministic() {
    let store = testing::stub_store(&[0.2, 0.5, 0.51, 0.99]);
    let mut source = SyntheticSource::with_seed(&store, 3);
    let p = source.synthesize();

    let first = model::score(&transform(&p, &store).unwrap(), store.models());
    let second = model::score(&transform(&p, &store).unwrap(), store.models());
    assert_eq!(first, second);
}

#[test]
fn test_channel_source() {
    let (feed, mut source) = ChannelSource::bounded(2);

    assert_eq!(source.next_packet(), Ok(None));

    assert!(feed.submit(packet(&[("Flow Duration", 1.0)])));
    assert!(feed.submit(packet(&[("Flow Duration", 2.0)])));
    assert!(!feed.submit(packet(&[("Flow Duration", 3.0)])));

    let first = source.next_packet().unwrap().unwrap();
    assert_eq!(first.resolve("Flow Duration"), 1.0);
    let _ = source.next_packet().unwrap();

    drop(feed);
    assert_eq!(source.next_packet(), Err(LoopFatalError::SourceClosed));
}
