//! Shared fixture builders for the integration tests.
//!
//! One moderately rich recording tree exercising every entity kind:
//! named and unnamed signals, all three series kinds, a channel group
//! with a spike-sorted cluster, and annotations on several levels.

use chrono::{DateTime, TimeZone, Utc};
use strata::{
    AnnotationValue, Attrs, Cluster, DiscreteSeries, Group, IdentityKey, Payload2d, Recording,
    SeriesKind, Signal, SubRecording, TimeBase, Waveforms,
};

/// Whole-second timestamp; sub-second precision does not survive the
/// store mapping, so fixtures stay on the grid.
pub fn ts(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

pub fn regular_time() -> TimeBase {
    TimeBase::Regular {
        interval: 0.001,
        offset: 0.0,
        unit: "s".to_string(),
    }
}

/// Deterministic multi-channel signal; `seed` varies the payload so two
/// fixtures never collide on content key by accident.
pub fn signal(name: Option<&str>, channels: usize, samples: usize, seed: f64) -> Signal {
    let values = (0..samples * channels)
        .map(|i| seed + i as f64 * 0.25)
        .collect();
    Signal {
        name: name.map(str::to_string),
        attrs: Attrs::default(),
        unit: "mV".to_string(),
        data: Payload2d::new(values, channels),
        time: regular_time(),
    }
}

pub fn events(name: &str, times: Vec<f64>) -> DiscreteSeries {
    let labels = (0..times.len()).map(|i| format!("ev{i}")).collect();
    DiscreteSeries {
        name: Some(name.to_string()),
        attrs: Attrs::default(),
        kind: SeriesKind::Events {
            times,
            unit: "s".to_string(),
            labels,
        },
    }
}

pub fn intervals(name: &str) -> DiscreteSeries {
    DiscreteSeries {
        name: Some(name.to_string()),
        attrs: Attrs::default(),
        kind: SeriesKind::Intervals {
            times: vec![0.0, 2.5, 7.0],
            durations: vec![2.5, 4.5, 1.0],
            unit: "s".to_string(),
            labels: vec!["rest".into(), "run".into(), "rest".into()],
        },
    }
}

pub fn spike_train(name: &str, with_waveforms: bool) -> DiscreteSeries {
    let waveforms = with_waveforms.then(|| Waveforms {
        data: (0..18).map(f64::from).collect(),
        spikes: 3,
        channels: 2,
        samples: 3,
        interval: 0.0005,
        unit: "uV".to_string(),
        left_sweep: Some(0.001),
    });
    DiscreteSeries {
        name: Some(name.to_string()),
        attrs: Attrs::default(),
        kind: SeriesKind::SpikeTrain {
            times: vec![0.4, 1.1, 2.9],
            unit: "s".to_string(),
            t_start: Some(0.0),
            t_stop: 10.0,
            waveforms,
        },
    }
}

pub fn rich_attrs() -> Attrs {
    let mut attrs = Attrs {
        description: Some("overnight session, rig 3".to_string()),
        origin: Some("rig3/raw/2024-02-11.dat".to_string()),
        created_at: ts(1_707_600_000),
        source_time: ts(1_707_596_400),
        annotations: Default::default(),
    };
    attrs
        .annotations
        .insert("experimenter".into(), AnnotationValue::Text("mk".into()));
    attrs
        .annotations
        .insert("probe_ok".into(), AnnotationValue::Bool(true));
    attrs
        .annotations
        .insert("depth_um".into(), AnnotationValue::Float(1250.0));
    attrs.annotations.insert(
        "channels_bad".into(),
        AnnotationValue::IntList(vec![3, 17, 21]),
    );
    attrs
}

/// The full fixture tree. Every read-back field of this tree compares
/// equal after a write, which is what the round-trip tests rely on.
pub fn session_recording() -> Recording {
    let sub = SubRecording {
        name: Some("trial0".to_string()),
        attrs: Attrs {
            description: Some("baseline trial".to_string()),
            ..Attrs::default()
        },
        signals: vec![
            signal(Some("lfp"), 3, 8, 0.0),
            signal(None, 1, 6, 100.0),
        ],
        series: vec![
            events("stim", vec![1.0, 4.0, 6.5]),
            intervals("states"),
            spike_train("unit1", true),
        ]
        .into(),
    };

    let group = Group {
        name: Some("shank0".to_string()),
        attrs: Attrs::default(),
        signals: vec![IdentityKey::Name("lfp".to_string())],
        clusters: vec![Cluster {
            name: Some("c1".to_string()),
            attrs: Attrs::default(),
            trains: vec![IdentityKey::Name("unit1".to_string())],
        }],
    };

    Recording {
        name: Some("session-01".to_string()),
        attrs: rich_attrs(),
        sub_recordings: vec![sub],
        groups: vec![group],
    }
}

/// Entity count of the session backing `store`, for diff assertions.
pub fn entity_count(store: &strata::RecordingStore) -> usize {
    store
        .handle()
        .with_store(|s| Ok(s.entity_count()))
        .expect("session open")
}
