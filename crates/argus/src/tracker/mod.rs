//! Multi-object tracker: greedy assignment of incoming poses to a bounded, age-evicted list of
//! tracks, with a pluggable similarity metric.

mod bbox;
mod keypoint;

pub use bbox::BoxSimilarity;
pub use keypoint::KeypointSimilarity;

use argus_geometry::{BoundingBox, Keypoint};

/// A pose to be matched against the tracker's existing tracks. `id` is filled in by
/// [`Tracker::apply`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
    pub bounding_box: Option<BoundingBox>,
    pub score: f32,
    pub id: Option<u64>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>, bounding_box: Option<BoundingBox>, score: f32) -> Self {
        Self { keypoints, bounding_box, score, id: None }
    }
}

/// A tracked identity, carrying the most recently assigned pose's data.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Track {
    pub id: u64,
    pub last_timestamp_us: i64,
    pub keypoints: Vec<Keypoint>,
    pub bounding_box: Option<BoundingBox>,
    pub score: f32,
}

/// A similarity metric between an incoming pose and an existing track, in `[0, 1]`.
pub trait Similarity {
    fn similarity(&self, pose: &Pose, track: &Track) -> f32;
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub max_tracks: usize,
    /// In milliseconds.
    pub max_age_ms: i64,
    pub min_similarity: f32,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_tracks < 1 {
            return Err(crate::Error::Config("maxTracks must be at least 1".into()));
        }
        if self.max_age_ms <= 0 {
            return Err(crate::Error::Config("maxAge must be positive".into()));
        }
        Ok(())
    }
}

/// A greedy multi-object tracker generic over its similarity metric (`S`): [`BoxSimilarity`] for
/// IoU-based tracking, [`KeypointSimilarity`] for OKS-based tracking.
#[derive(Debug, Clone)]
pub struct Tracker<S> {
    config: TrackerConfig,
    similarity: S,
    tracks: Vec<Track>,
    next_id: u64,
}

impl<S: Similarity> Tracker<S> {
    pub fn new(config: TrackerConfig, similarity: S) -> Result<Self, crate::Error> {
        config.validate()?;
        Ok(Self { config, similarity, tracks: Vec::new(), next_id: 1 })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn remove(&mut self, ids: &[u64]) {
        self.tracks.retain(|t| !ids.contains(&t.id));
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }

    /// Matches `poses` (assumed sorted by confidence descending, per spec.md §4.6) against the
    /// current tracks at `timestamp_us`, creating, updating, and evicting tracks as needed, and
    /// filling in each pose's `id`.
    pub fn apply(&mut self, poses: &mut [Pose], timestamp_us: i64) {
        self.tracks.retain(|t| timestamp_us - t.last_timestamp_us <= self.config.max_age_ms * 1000);

        let mut assigned = vec![false; self.tracks.len()];

        for pose in poses.iter_mut() {
            let mut best: Option<(usize, f32)> = None;
            for (i, track) in self.tracks.iter().enumerate() {
                if assigned[i] {
                    continue;
                }
                let sim = self.similarity.similarity(pose, track);
                if sim >= self.config.min_similarity && best.map_or(true, |(_, best_sim)| sim > best_sim) {
                    best = Some((i, sim));
                }
            }

            match best {
                Some((i, _)) => {
                    assigned[i] = true;
                    let track = &mut self.tracks[i];
                    track.last_timestamp_us = timestamp_us;
                    track.keypoints = pose.keypoints.clone();
                    track.bounding_box = pose.bounding_box;
                    track.score = pose.score;
                    pose.id = Some(track.id);
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.push(Track {
                        id,
                        last_timestamp_us: timestamp_us,
                        keypoints: pose.keypoints.clone(),
                        bounding_box: pose.bounding_box,
                        score: pose.score,
                    });
                    assigned.push(true);
                    pose.id = Some(id);
                }
            }
        }

        self.tracks.sort_by(|a, b| b.last_timestamp_us.cmp(&a.last_timestamp_us));
        self.tracks.truncate(self.config.max_tracks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicted_tracks_are_not_resurrected() {
        let config = TrackerConfig { max_tracks: 4, max_age_ms: 1000, min_similarity: 0.3 };
        let mut tracker = Tracker::new(config, BoxSimilarity { iou_threshold: 0.3 }).unwrap();

        let bbox = BoundingBox::from_center(0.5, 0.5, 1.0, 1.0);
        let mut poses = vec![Pose::new(vec![], Some(bbox), 1.0)];
        tracker.apply(&mut poses, 0);
        assert_eq!(poses[0].id, Some(1));

        // S6: identical box after maxAge has elapsed spawns a new id, not a re-link.
        let mut poses = vec![Pose::new(vec![], Some(bbox), 1.0)];
        tracker.apply(&mut poses, 1_050_000);
        assert_eq!(poses[0].id, Some(2));
    }

    #[test]
    fn config_rejects_invalid_ranges() {
        assert!(TrackerConfig { max_tracks: 0, max_age_ms: 1000, min_similarity: 0.0 }.validate().is_err());
        assert!(TrackerConfig { max_tracks: 1, max_age_ms: 0, min_similarity: 0.0 }.validate().is_err());
    }

    #[test]
    fn s5_keypoint_tracker_id_sequence_matches_spec_scenario() {
        use std::collections::BTreeSet;

        let config = TrackerConfig { max_tracks: 4, max_age_ms: 1000, min_similarity: 0.5 };
        let similarity = KeypointSimilarity {
            keypoint_confidence_threshold: 0.2,
            falloff: vec![0.1, 0.1, 0.1, 0.1],
            min_number_of_keypoints: 2,
        };
        let mut tracker = Tracker::new(config, similarity).unwrap();

        // Each "object" is a unit-square set of 4 keypoints translated far enough apart (10
        // units) that OKS similarity between distinct objects is ~0, while the same object
        // reappearing at identical coordinates scores 1.0 against its own track.
        fn object(origin: f32) -> Vec<Keypoint> {
            vec![
                Keypoint::new(origin, origin).with_score(1.0),
                Keypoint::new(origin + 1.0, origin).with_score(1.0),
                Keypoint::new(origin, origin + 1.0).with_score(1.0),
                Keypoint::new(origin + 1.0, origin + 1.0).with_score(1.0),
            ]
        }
        fn ids(poses: &[Pose]) -> BTreeSet<u64> {
            poses.iter().map(|p| p.id.unwrap()).collect()
        }
        fn set(ids: &[u64]) -> BTreeSet<u64> {
            ids.iter().copied().collect()
        }

        let a = object(0.0);
        let b = object(10.0);
        let c = object(20.0);
        let d = object(30.0);
        let e = object(40.0);
        let f = object(50.0);

        // t = 0us: a single pose, no existing tracks -> id 1.
        let mut poses = vec![Pose::new(a.clone(), None, 0.9)];
        tracker.apply(&mut poses, 0);
        assert_eq!(ids(&poses), set(&[1]));

        // t = 100_000us: `a` re-matches track 1; `b` is new -> id 2.
        let mut poses = vec![Pose::new(a, None, 0.95), Pose::new(b.clone(), None, 0.9)];
        tracker.apply(&mut poses, 100_000);
        assert_eq!(ids(&poses), set(&[1, 2]));

        // t = 900_000us: track 1 (last seen at 100_000us) survives the age filter but nothing in
        // this batch matches it; `b` re-matches track 2, `c` is new -> id 3.
        let mut poses = vec![Pose::new(b.clone(), None, 0.95), Pose::new(c, None, 0.9)];
        tracker.apply(&mut poses, 900_000);
        assert_eq!(ids(&poses), set(&[2, 3]));

        // t = 1_200_000us: track 1 (last seen 100_000us) is now 1_100_000us stale, past
        // maxAge(1000ms) -> evicted before assignment. `d` and `e` are new, `b` re-matches
        // track 2.
        let mut poses =
            vec![Pose::new(d, None, 0.97), Pose::new(b, None, 0.95), Pose::new(e, None, 0.9)];
        tracker.apply(&mut poses, 1_200_000);
        assert_eq!(ids(&poses), set(&[4, 2, 5]));

        // t = 1_300_000us: `f` is new -> id 6. Tracks 2, 3, 4, 5 are all still within maxAge, but
        // spawning track 6 pushes the live count to 5 against maxTracks=4, evicting the
        // least-recently-updated track (3, last touched at 900_000us).
        let mut poses = vec![Pose::new(f, None, 0.9)];
        tracker.apply(&mut poses, 1_300_000);
        assert_eq!(ids(&poses), set(&[6]));

        let live_ids: BTreeSet<u64> = tracker.tracks().iter().map(|t| t.id).collect();
        assert_eq!(live_ids, set(&[6, 2, 4, 5]));
    }

    #[test]
    fn never_assigns_duplicate_ids() {
        let config = TrackerConfig { max_tracks: 10, max_age_ms: 1000, min_similarity: 2.0 }; // unreachable similarity -> always new tracks
        let mut tracker = Tracker::new(config, BoxSimilarity { iou_threshold: 0.0 }).unwrap();
        let mut poses = vec![
            Pose::new(vec![], Some(BoundingBox::from_center(0.0, 0.0, 1.0, 1.0)), 1.0),
            Pose::new(vec![], Some(BoundingBox::from_center(5.0, 5.0, 1.0, 1.0)), 0.9),
        ];
        tracker.apply(&mut poses, 0);
        let ids: Vec<_> = tracker.tracks().iter().map(|t| t.id).collect();
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());
    }
}
