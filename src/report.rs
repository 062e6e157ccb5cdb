//! Outcome of schema initialization, one event per migration step.

use std::fmt;

use serde::Serialize;
use tracing::{debug, error, info};

/// The migration steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationStep {
   /// Add `clothing_categories.is_system` to tables created before it existed
   SystemFlagColumn,
   /// Insert the default categories for every user
   SeedSystemCategories,
   /// Rebuild `clothing_items` with an integer `category` foreign key
   CategoryToId,
   /// Fill `clothing_item_categories` from each item's primary category
   CategoryJoinBackfill,
}

impl MigrationStep {
   pub const ALL: [MigrationStep; 4] = [
      MigrationStep::SystemFlagColumn,
      MigrationStep::SeedSystemCategories,
      MigrationStep::CategoryToId,
      MigrationStep::CategoryJoinBackfill,
   ];

   pub fn name(self) -> &'static str {
      match self {
         MigrationStep::SystemFlagColumn => "system_flag_column",
         MigrationStep::SeedSystemCategories => "seed_system_categories",
         MigrationStep::CategoryToId => "category_to_id",
         MigrationStep::CategoryJoinBackfill => "category_join_backfill",
      }
   }
}

impl fmt::Display for MigrationStep {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.name())
   }
}

/// What a migration step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum MigrationStatus {
   /// The step changed the database
   Applied(String),
   /// Nothing to do; the database was already at (or past) this step
   Skipped(String),
   /// The step failed and was rolled back where possible
   Failed(String),
}

impl MigrationStatus {
   pub fn is_failed(&self) -> bool {
      matches!(self, MigrationStatus::Failed(_))
   }

   pub fn detail(&self) -> &str {
      match self {
         MigrationStatus::Applied(detail)
         | MigrationStatus::Skipped(detail)
         | MigrationStatus::Failed(detail) => detail,
      }
   }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationEvent {
   pub step: MigrationStep,
   #[serde(flatten)]
   pub status: MigrationStatus,
}

/// Health signal returned by schema initialization.
///
/// A failed step never stops startup; callers that care can check
/// [`SchemaReport::is_healthy`] or inspect [`SchemaReport::failures`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaReport {
   events: Vec<MigrationEvent>,
}

impl SchemaReport {
   pub fn new() -> Self {
      Self::default()
   }

   /// Append the outcome of a step, logging it.
   pub fn record(&mut self, step: MigrationStep, status: MigrationStatus) {
      match &status {
         MigrationStatus::Applied(detail) => info!("Migration {} applied: {}", step, detail),
         MigrationStatus::Skipped(detail) => debug!("Migration {} skipped: {}", step, detail),
         MigrationStatus::Failed(detail) => error!("Migration {} failed: {}", step, detail),
      }
      self.events.push(MigrationEvent { step, status });
   }

   pub fn events(&self) -> &[MigrationEvent] {
      &self.events
   }

   pub fn is_healthy(&self) -> bool {
      !self.events.iter().any(|e| e.status.is_failed())
   }

   pub fn failures(&self) -> impl Iterator<Item = &MigrationEvent> {
      self.events.iter().filter(|e| e.status.is_failed())
   }

   /// Status of the most recent run of `step`, if it ran.
   pub fn status_of(&self, step: MigrationStep) -> Option<&MigrationStatus> {
      self
         .events
         .iter()
         .rev()
         .find(|e| e.step == step)
         .map(|e| &e.status)
   }
}
