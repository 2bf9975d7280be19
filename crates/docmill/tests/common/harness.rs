//! Pipeline test harness: temporary intake and work directories, an
//! in-memory database and runners wired to in-process fakes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::params;
use tempfile::TempDir;

use docmill::db::action_repo::{self, ActionRow};
use docmill::db::document_repo::{self, DocumentRow, NewDocument};
use docmill::db::run_repo::{self, RunRow};
use docmill::db::{content_repo, Database};
use docmill::pipeline::Collaborators;
use docmill::{Config, Runner};

use super::builders;

pub struct PipelineHarness {
    temp_dir: TempDir,
    /// Intake directory the configuration points at.
    pub inbox_dir: PathBuf,
    /// Work directory step outputs land under, one subdirectory per lineage.
    pub work_dir: PathBuf,
    /// In-memory store shared by every runner this harness builds.
    pub db: Database,
    /// Configuration handed to every runner this harness builds.
    pub config: Config,
}

impl PipelineHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let inbox_dir = temp_dir.path().join("inbox");
        let work_dir = temp_dir.path().join("work");
        std::fs::create_dir_all(&inbox_dir).expect("Failed to create inbox directory");
        std::fs::create_dir_all(&work_dir).expect("Failed to create work directory");

        let config = Config::with_directories(
            &inbox_dir.display().to_string(),
            &work_dir.display().to_string(),
        );
        let db = Database::open_in_memory().expect("Failed to open in-memory database");

        Self {
            temp_dir,
            inbox_dir,
            work_dir,
            db,
            config,
        }
    }

    /// Runner over the harness database and configuration.
    pub fn runner(&self, collaborators: Collaborators) -> Runner {
        Runner::with_collaborators(self.db.clone(), self.config.clone(), collaborators)
            .expect("Failed to build runner")
    }

    /// Drops a file with arbitrary content into the intake directory.
    pub fn write_inbox(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.inbox_dir.join(name);
        std::fs::write(&path, bytes).expect("Failed to write inbox file");
        path
    }

    /// Drops a real PDF into the intake directory, one page per entry.
    pub fn write_inbox_pdf(&self, name: &str, pages: &[&str]) -> PathBuf {
        builders::save_pdf(builders::pdf_with_pages(pages), &self.inbox_dir.join(name))
    }

    /// Path of a file inside one lineage's work directory.
    pub fn work_path(&self, base_id: i64, name: &str) -> PathBuf {
        self.work_dir.join(base_id.to_string()).join(name)
    }

    /// Registers a lineage root directly, bypassing the inbox scan.
    pub fn insert_root(&self, file_name: &str, step: &str, status: &str) -> i64 {
        let directory = self.inbox_dir.display().to_string();
        self.db
            .with_tx(|conn| {
                document_repo::create_root(conn, step, status, &directory, file_name, "eng")
            })
            .expect("Failed to insert root document")
    }

    /// Adds a derived document waiting in `ready` at the given step.
    pub fn insert_child(
        &self,
        parent_id: i64,
        base_id: i64,
        step: &str,
        directory: &Path,
        file_name: &str,
    ) -> i64 {
        self.db
            .with_tx(|conn| {
                document_repo::create_child(
                    conn,
                    &NewDocument {
                        parent_id,
                        base_id,
                        step: step.to_string(),
                        status: "ready".to_string(),
                        directory: directory.display().to_string(),
                        file_name: file_name.to_string(),
                        language: "eng".to_string(),
                    },
                )
            })
            .expect("Failed to insert child document")
    }

    pub fn document(&self, id: i64) -> DocumentRow {
        self.db
            .with_conn(|conn| document_repo::find_by_id(conn, id))
            .expect("Failed to query document")
            .expect("Document does not exist")
    }

    /// The document registered under the given file name.
    pub fn document_by_name(&self, file_name: &str) -> DocumentRow {
        let id: i64 = self
            .db
            .with_conn(|conn| {
                let id = conn.query_row(
                    "SELECT id FROM document WHERE file_name = ?1",
                    params![file_name],
                    |r| r.get(0),
                )?;
                Ok(id)
            })
            .expect("Failed to find document by name");
        self.document(id)
    }

    /// Derived documents of the given parent, in creation order.
    pub fn children_of(&self, parent_id: i64) -> Vec<DocumentRow> {
        let ids: Vec<i64> = self
            .db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id FROM document WHERE parent_id = ?1 AND id != parent_id
                     ORDER BY id ASC",
                )?;
                let ids = stmt
                    .query_map(params![parent_id], |r| r.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .expect("Failed to query children");
        ids.into_iter().map(|id| self.document(id)).collect()
    }

    /// Ids of all documents sitting at the given step, ascending.
    pub fn ids_at_step(&self, step: &str) -> Vec<i64> {
        self.db
            .with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id FROM document WHERE step = ?1 ORDER BY id ASC")?;
                let ids = stmt
                    .query_map(params![step], |r| r.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .expect("Failed to query documents by step")
    }

    pub fn actions_for(&self, document_id: i64) -> Vec<ActionRow> {
        self.db
            .with_conn(|conn| action_repo::list_for_document(conn, document_id))
            .expect("Failed to query actions")
    }

    /// How many actions were recorded for the given step code, across
    /// all documents.
    pub fn action_count(&self, code: &str) -> i64 {
        self.db
            .with_conn(|conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM action WHERE code = ?1",
                    params![code],
                    |r| r.get(0),
                )?;
                Ok(count)
            })
            .expect("Failed to count actions")
    }

    pub fn page_texts(&self, document_id: i64) -> Vec<(u32, String)> {
        self.db
            .with_conn(|conn| content_repo::page_texts(conn, document_id))
            .expect("Failed to query page texts")
    }

    pub fn tokens(&self, document_id: i64) -> Vec<(u32, String)> {
        self.db
            .with_conn(|conn| content_repo::tokens(conn, document_id))
            .expect("Failed to query tokens")
    }

    pub fn run_row(&self, run_id: i64) -> RunRow {
        self.db
            .with_conn(|conn| run_repo::find_by_id(conn, run_id))
            .expect("Failed to query run")
            .expect("Run does not exist")
    }

    pub fn latest_run(&self) -> Option<RunRow> {
        self.db
            .with_conn(|conn| run_repo::recent(conn, 1))
            .expect("Failed to query runs")
            .into_iter()
            .next()
    }

    pub fn lineage_depth(&self, id: i64) -> u32 {
        self.db
            .with_conn(|conn| document_repo::lineage_depth(conn, id))
            .expect("Failed to compute lineage depth")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_creates_directories() {
        let harness = PipelineHarness::new();
        assert!(harness.inbox_dir.is_dir());
        assert!(harness.work_dir.is_dir());
        assert_eq!(harness.config.language, "eng");
    }

    #[test]
    fn test_insert_and_query_lineage() {
        let harness = PipelineHarness::new();
        let root = harness.insert_root("base.pdf", "inbox", "end");
        let child = harness.insert_child(root, root, "reunite", &harness.work_dir, "p1.pdf");

        assert!(harness.document(root).is_root());
        let children = harness.children_of(root);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child);
        assert_eq!(harness.ids_at_step("reunite"), vec![child]);
        assert_eq!(harness.lineage_depth(child), 1);
    }
}
