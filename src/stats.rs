//! Per-frame presence table and its CSV form.
//!
//! Rows are SPARSE: one row per analyzed frame, keyed by the raw frame index.
//! Carried-over frames add nothing. The CSV header is
//! `frame,Unknown,<actor_1>,<actor_2>,...`; a cell is empty or a quoted
//! `(top, right, bottom, left)` box.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::detect::BoundingBox;
use crate::error::CastwatchError;
use crate::matcher::{MatchResult, UNKNOWN_LABEL};

const FRAME_COLUMN: &str = "frame";

/// Presence of each identity in one analyzed frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresenceRow {
    pub frame: u64,
    cells: BTreeMap<String, BoundingBox>,
}

impl PresenceRow {
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&BoundingBox> {
        self.cells.get(column)
    }

    pub fn is_present(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Non-empty cells, ordered by column name.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &BoundingBox)> {
        self.cells.iter().map(|(name, bbox)| (name.as_str(), bbox))
    }
}

/// Growing table of presence rows, one writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceTable {
    columns: Vec<String>,
    rows: Vec<PresenceRow>,
}

impl PresenceTable {
    /// Table with columns `Unknown` followed by `actors` in order, duplicates dropped.
    pub fn new<I, S>(actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns = vec![UNKNOWN_LABEL.to_string()];
        for actor in actors {
            let actor = actor.into();
            if !columns.contains(&actor) {
                columns.push(actor);
            }
        }
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Actor columns, `Unknown` excluded.
    pub fn actors(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|c| *c != UNKNOWN_LABEL)
    }

    pub fn rows(&self) -> &[PresenceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn max_frame(&self) -> Option<u64> {
        self.rows.last().map(|row| row.frame)
    }

    /// Records one analyzed frame.
    ///
    /// When several results share a name, the last one in detection order
    /// overwrites the others. Names outside the column set are dropped.
    pub fn record(&mut self, frame: u64, results: &[MatchResult]) -> Result<()> {
        if let Some(last) = self.max_frame() {
            if frame <= last {
                return Err(anyhow!(
                    "frame {} recorded after frame {}; rows must grow by frame index",
                    frame,
                    last
                ));
            }
        }
        let mut row = PresenceRow::new(frame);
        for result in results {
            let label = result.identity.label();
            if !self.columns.iter().any(|c| c == label) {
                log::warn!("frame {}: '{}' is not a table column, dropped", frame, label);
                continue;
            }
            row.cells.insert(label.to_string(), result.bbox);
        }
        self.rows.push(row);
        Ok(())
    }

    /// Writes the table as CSV.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<()> {
        let header: Vec<String> = std::iter::once(FRAME_COLUMN.to_string())
            .chain(self.columns.iter().map(|c| quote_field(c)))
            .collect();
        writeln!(out, "{}", header.join(","))?;
        for row in &self.rows {
            let mut fields = vec![row.frame.to_string()];
            for column in &self.columns {
                fields.push(
                    row.get(column)
                        .map(|bbox| quote_field(&bbox.to_string()))
                        .unwrap_or_default(),
                );
            }
            writeln!(out, "{}", fields.join(","))?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create stats file {}", path.display()))?;
        self.write_csv(BufWriter::new(file))
            .with_context(|| format!("failed to write stats file {}", path.display()))
    }

    /// Reads a table written by `write_csv`.
    ///
    /// A leading unnamed index column (as written by dataframe tools) is ignored.
    pub fn read_csv<R: BufRead>(input: R) -> Result<Self> {
        let mut lines = input.lines().enumerate();
        let header = match lines.next() {
            Some((_, line)) => split_fields(&line?, 1)?,
            None => return Err(CastwatchError::invalid_stats(1, "missing header").into()),
        };
        let skip_index = header.first().is_some_and(|h| h.trim().is_empty());
        let header: Vec<String> = header.into_iter().skip(usize::from(skip_index)).collect();
        let frame_pos = header
            .iter()
            .position(|h| h == FRAME_COLUMN)
            .ok_or_else(|| CastwatchError::invalid_stats(1, "no 'frame' column"))?;

        let mut table = PresenceTable {
            columns: Vec::new(),
            rows: Vec::new(),
        };
        if !header.iter().any(|h| h == UNKNOWN_LABEL) {
            table.columns.push(UNKNOWN_LABEL.to_string());
        }
        table.columns.extend(
            header
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != frame_pos)
                .map(|(_, h)| h.clone()),
        );

        let mut rows: Vec<PresenceRow> = Vec::new();
        for (idx, line) in lines {
            let line_no = idx + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<String> = split_fields(&line, line_no)?
                .into_iter()
                .skip(usize::from(skip_index))
                .collect();
            if fields.len() != header.len() {
                return Err(CastwatchError::invalid_stats(
                    line_no,
                    format!("expected {} fields, found {}", header.len(), fields.len()),
                )
                .into());
            }
            let frame: u64 = fields[frame_pos].trim().parse().map_err(|_| {
                CastwatchError::invalid_stats(
                    line_no,
                    format!("bad frame index '{}'", fields[frame_pos]),
                )
            })?;
            let mut row = PresenceRow::new(frame);
            for (i, value) in fields.iter().enumerate() {
                if i == frame_pos || value.trim().is_empty() {
                    continue;
                }
                let bbox = parse_box(value)
                    .ok_or_else(|| CastwatchError::invalid_stats(line_no, format!("bad box '{}'", value)))?;
                row.cells.insert(header[i].clone(), bbox);
            }
            rows.push(row);
        }
        rows.sort_by_key(|row| row.frame);
        table.rows = rows;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open stats file {}", path.display()))?;
        Self::read_csv(BufReader::new(file))
            .with_context(|| format!("failed to read stats file {}", path.display()))
    }
}

fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn split_fields(line: &str, line_no: usize) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();
    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(CastwatchError::invalid_stats(line_no, "unterminated quote").into());
    }
    fields.push(field);
    Ok(fields)
}

fn parse_box(value: &str) -> Option<BoundingBox> {
    let inner = value
        .trim()
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']']);
    let coords: Vec<u32> = inner
        .split(',')
        .map(|c| c.trim().parse().ok())
        .collect::<Option<_>>()?;
    let coords: [u32; 4] = coords.try_into().ok()?;
    Some(BoundingBox::from(coords))
}
