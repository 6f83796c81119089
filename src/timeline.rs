//! Bucketed presence timeline.
//!
//! The presence table is coarsened into fixed-width time buckets, the most
//! present actors are kept, and each one gets a bar wherever its per-bucket
//! count clears the visibility threshold.

use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};

use crate::error::CastwatchError;
use crate::render::{self, BLACK, GREY, WHITE};
use crate::stats::PresenceTable;

/// Number of buckets a timeline is aimed at.
const TARGET_BUCKETS: u64 = 160;
const TICK_COUNT: usize = 10;

const BAR_COLORS: [Rgb<u8>; 7] = [
    Rgb([0, 0, 255]),
    Rgb([0, 128, 0]),
    Rgb([255, 0, 0]),
    Rgb([0, 191, 191]),
    Rgb([191, 0, 191]),
    Rgb([191, 191, 0]),
    Rgb([0, 0, 0]),
];

/// `bucket_width = floor(movie_length / 160) + 1`, `min_frames_visible = floor(bucket_width / 3)`.
pub fn bucket_params(movie_length: u64) -> (u64, u64) {
    let bucket_width = movie_length / TARGET_BUCKETS + 1;
    (bucket_width, bucket_width / 3)
}

/// Per-bucket presence for one actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorTimeline {
    pub name: String,
    /// Row counts per bucket, aligned with `PresenceTimeline::bucket_starts`.
    pub counts: Vec<u64>,
    pub total: u64,
    /// `[start, end)` seconds where the actor is visible.
    pub intervals: Vec<(u64, u64)>,
}

/// Read-only timeline derived from a presence table.
#[derive(Clone, Debug, PartialEq)]
pub struct PresenceTimeline {
    pub movie_length: u64,
    pub effective_fps: f64,
    pub bucket_width: u64,
    pub min_frames_visible: u64,
    /// Start second of each non-empty bucket, ascending.
    pub bucket_starts: Vec<u64>,
    /// Selected actors, most present first.
    pub actors: Vec<ActorTimeline>,
}

impl PresenceTimeline {
    pub fn from_table(table: &PresenceTable, movie_length: u64, top_actors: usize) -> Result<Self> {
        if movie_length == 0 {
            return Err(CastwatchError::Config("movie length must be positive".to_string()).into());
        }
        let max_frame = table.max_frame().unwrap_or(0);
        let effective_fps = max_frame as f64 / movie_length as f64;
        let (bucket_width, min_frames_visible) = bucket_params(movie_length);

        let second_of = |frame: u64| -> u64 {
            if effective_fps > 0.0 {
                (frame as f64 / effective_fps).floor() as u64
            } else {
                0
            }
        };

        let mut bucket_starts: Vec<u64> = table
            .rows()
            .iter()
            .map(|row| second_of(row.frame) / bucket_width * bucket_width)
            .collect();
        bucket_starts.sort_unstable();
        bucket_starts.dedup();

        let mut candidates: Vec<ActorTimeline> = table
            .actors()
            .map(|name| ActorTimeline {
                name: name.to_string(),
                counts: vec![0; bucket_starts.len()],
                total: 0,
                intervals: Vec::new(),
            })
            .collect();

        for row in table.rows() {
            let start = second_of(row.frame) / bucket_width * bucket_width;
            let Ok(bucket) = bucket_starts.binary_search(&start) else {
                continue;
            };
            for actor in candidates.iter_mut() {
                if row.is_present(&actor.name) {
                    actor.counts[bucket] += 1;
                    actor.total += 1;
                }
            }
        }

        // Stable: ties keep column order.
        candidates.sort_by(|a, b| b.total.cmp(&a.total));
        candidates.truncate(top_actors);

        for actor in candidates.iter_mut() {
            actor.intervals = bucket_starts
                .windows(2)
                .zip(&actor.counts)
                .filter(|(_, &count)| count > min_frames_visible)
                .map(|(pair, _)| (pair[0], pair[1]))
                .collect();
        }

        Ok(Self {
            movie_length,
            effective_fps,
            bucket_width,
            min_frames_visible,
            bucket_starts,
            actors: candidates,
        })
    }

    /// Last second covered by the x axis.
    fn x_extent(&self) -> u64 {
        let last_bucket_end = self
            .bucket_starts
            .last()
            .map(|s| s + self.bucket_width)
            .unwrap_or(0);
        last_bucket_end.max(self.movie_length).max(1)
    }
}

/// Vertical marker on the timeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelineEvent {
    pub second: u64,
    pub label: String,
}

impl TimelineEvent {
    /// Parses `H:MM:SS=label` or `SECONDS=label`.
    pub fn parse(value: &str) -> Result<Self> {
        let (time, label) = value
            .split_once('=')
            .ok_or_else(|| anyhow!("event '{}' must look like HH:MM:SS=label", value))?;
        Ok(Self {
            second: parse_time(time.trim())?,
            label: label.trim().to_string(),
        })
    }
}

/// `H:MM:SS`, `MM:SS` or plain seconds.
pub fn parse_time(value: &str) -> Result<u64> {
    let mut seconds = 0u64;
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return Err(anyhow!("invalid time '{}'", value));
    }
    for part in parts {
        let n: u64 = part
            .parse()
            .map_err(|_| anyhow!("invalid time '{}'", value))?;
        seconds = seconds * 60 + n;
    }
    Ok(seconds)
}

/// Seconds as `H:MM:SS`.
pub struct Clock(pub u64);

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        write!(f, "{}:{:02}:{:02}", s / 3600, s / 60 % 60, s % 60)
    }
}

/// Renders a `PresenceTimeline` as a bar chart.
#[derive(Clone, Copy, Debug)]
pub struct TimelineVisualizer {
    width: u32,
    height: u32,
}

impl Default for TimelineVisualizer {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 500,
        }
    }
}

impl TimelineVisualizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(200),
            height: height.max(120),
        }
    }

    pub fn render(&self, timeline: &PresenceTimeline, events: &[TimelineEvent]) -> RgbImage {
        let mut image = RgbImage::from_pixel(self.width, self.height, WHITE);
        let label_w = timeline
            .actors
            .iter()
            .map(|a| render::text_size(&a.name, 1).0)
            .max()
            .unwrap_or(0) as i64;

        let left = label_w + 20;
        let right = self.width as i64 - 20;
        let top = 30i64;
        let bottom = self.height as i64 - 40;
        let extent = timeline.x_extent() as f64;
        let x_of = |second: u64| left + ((second as f64 / extent) * (right - left) as f64) as i64;

        let rows = timeline.actors.len().max(1) as i64;
        let row_h = (bottom - top) / rows;
        for (i, actor) in timeline.actors.iter().enumerate() {
            // First actor on the bottom row.
            let row_bottom = bottom - i as i64 * row_h;
            let bar_top = row_bottom - row_h * 9 / 10;
            let bar_bottom = row_bottom - row_h / 10;
            let color = BAR_COLORS[i % BAR_COLORS.len()];
            for &(start, end) in &actor.intervals {
                render::fill_rect(&mut image, x_of(start), bar_top, x_of(end).max(x_of(start) + 1), bar_bottom, color);
            }
            let text_y = (bar_top + bar_bottom) / 2 - 3;
            render::draw_text(&mut image, 10, text_y, &actor.name, 1, BLACK);
        }

        render::fill_rect(&mut image, left, bottom, right, bottom + 1, BLACK);
        render::fill_rect(&mut image, left, top, left + 1, bottom, BLACK);

        let step = (timeline.bucket_starts.len() / TICK_COUNT).max(1);
        for &tick in timeline.bucket_starts.iter().step_by(step) {
            let x = x_of(tick);
            render::fill_rect(&mut image, x, bottom, x + 1, bottom + 5, BLACK);
            let label = Clock(tick).to_string();
            let (w, _) = render::text_size(&label, 1);
            render::draw_text(&mut image, x - w as i64 / 2, bottom + 10, &label, 1, BLACK);
        }

        for event in events {
            let x = x_of(event.second);
            render::draw_dashed_vline(&mut image, x, top, bottom, 6, GREY);
            render::draw_text(&mut image, x, top - 12, &event.label, 1, BLACK);
        }

        image
    }

    pub fn save(&self, path: &Path, timeline: &PresenceTimeline, events: &[TimelineEvent]) -> Result<()> {
        self.render(timeline, events)
            .save(path)
            .with_context(|| format!("failed to write timeline image {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::matcher::{Identity, MatchResult};

    fn seen(names: &[&str]) -> Vec<MatchResult> {
        names
            .iter()
            .map(|n| MatchResult {
                identity: if *n == "?" {
                    Identity::Unknown
                } else {
                    Identity::known(*n)
                },
                bbox: BoundingBox::new(0, 1, 1, 0),
            })
            .collect()
    }

    #[test]
    fn bucket_width_for_long_movie() {
        assert_eq!(bucket_params(1600), (11, 3));
        assert_eq!(bucket_params(100), (1, 0));
        assert_eq!(bucket_params(160), (2, 0));
    }

    /// 320 s at 10 fps sampled every 10 frames: one row per second,
    /// bucket width 3 s, threshold 1 row.
    fn table() -> PresenceTable {
        let mut table = PresenceTable::new(["Alice", "Bob", "Carol"]);
        for second in 0..=320u64 {
            let names: &[&str] = match second {
                0..=8 => &["Alice", "?"],
                9..=11 => &["Bob"],
                12..=299 => &["Alice", "Bob"],
                _ => &["Carol"],
            };
            table.record(second * 10, &seen(names)).unwrap();
        }
        table
    }

    #[test]
    fn intervals_follow_threshold() {
        let timeline = PresenceTimeline::from_table(&table(), 320, 2).unwrap();
        assert_eq!(timeline.bucket_width, 3);
        assert_eq!(timeline.min_frames_visible, 1);
        assert_eq!(timeline.effective_fps, 10.0);

        let names: Vec<_> = timeline.actors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);

        let alice = &timeline.actors[0];
        assert_eq!(alice.total, 297);
        assert_eq!(alice.intervals.first(), Some(&(0, 3)));
        assert!(!alice.intervals.contains(&(9, 12)));
        assert!(alice.intervals.contains(&(12, 15)));
        assert_eq!(alice.intervals.last(), Some(&(297, 300)));

        let bob = &timeline.actors[1];
        assert_eq!(bob.intervals.first(), Some(&(9, 12)));
    }

    #[test]
    fn unknown_is_never_ranked() {
        let mut table = PresenceTable::new(["Alice"]);
        for f in 0..10u64 {
            table.record(f, &seen(&["?", "?"])).unwrap();
        }
        let timeline = PresenceTimeline::from_table(&table, 10, 5).unwrap();
        assert_eq!(timeline.actors.len(), 1);
        assert_eq!(timeline.actors[0].name, "Alice");
        assert!(timeline.actors[0].intervals.is_empty());
    }

    #[test]
    fn bucketing_is_idempotent() {
        let table = table();
        let a = PresenceTimeline::from_table(&table, 320, 3).unwrap();
        let b = PresenceTimeline::from_table(&table, 320, 3).unwrap();
        assert_eq!(a, b);
        assert!(PresenceTimeline::from_table(&table, 0, 3).is_err());
    }

    #[test]
    fn parses_event_times() {
        assert_eq!(parse_time("1:02:03").unwrap(), 3723);
        assert_eq!(parse_time("90").unwrap(), 90);
        assert!(parse_time("1:x").is_err());
        let event = TimelineEvent::parse("0:05:00 = Heist").unwrap();
        assert_eq!(event, TimelineEvent { second: 300, label: "Heist".to_string() });
        assert!(TimelineEvent::parse("0:05:00").is_err());
        assert_eq!(Clock(3723).to_string(), "1:02:03");
    }

    #[test]
    fn renders_bars_for_visible_intervals() {
        let timeline = PresenceTimeline::from_table(&table(), 320, 2).unwrap();
        let events = vec![TimelineEvent { second: 150, label: "Mid".to_string() }];
        let image = TimelineVisualizer::default().render(&timeline, &events);
        assert_eq!(image.dimensions(), (1200, 500));
        let blue = BAR_COLORS[0];
        assert!(image.pixels().any(|p| *p == blue));
        assert!(image.pixels().any(|p| *p == GREY));
    }
}
