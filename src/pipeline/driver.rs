//! The fixpoint driver.
//!
//! State machine: Init (truncate the ledger) -> Seed (once) -> Round loop ->
//! Terminal. Each round snapshots the frontier from the ledger's current
//! partition, writes a boundary marker, runs one closure pass over a fresh
//! scan of the shrunken tree, compacts the ledger down to the round's own
//! appends, and terminates when compaction leaves the ledger empty.
//!
//! Termination rests on the tree being finite: every round either deletes
//! files (strictly shrinking the remaining set) or appends nothing and ends
//! the loop. A cyclic or pathological tree is cut off by `max_rounds`.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::domain::{PipelineReport, RoundReport, SourceFile};
use crate::engine::rules::{RenameImportRule, RenameTagRule};
use crate::engine::{RewriteEngine, Rule};
use crate::ledger::{Frontier, Ledger};
use crate::pipeline::{closure, seed, Deleter, SweepContext};
use crate::scan::SourceScanner;

pub struct Driver {
    root: PathBuf,
    config: Config,
    dry_run: bool,
    show_progress: bool,
}

impl Driver {
    pub fn new(root: PathBuf, config: Config, dry_run: bool) -> Self {
        Self { root, config, dry_run, show_progress: false }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn package_root(&self) -> PathBuf {
        match &self.config.package_root {
            Some(rel) => self.root.join(rel),
            None => self.root.clone(),
        }
    }

    fn ledger_path(&self) -> PathBuf {
        if self.config.ledger_path.is_absolute() {
            self.config.ledger_path.clone()
        } else {
            self.root.join(&self.config.ledger_path)
        }
    }

    fn scan(&self, deleter: &Deleter) -> Result<Vec<SourceFile>> {
        let mut scanner = SourceScanner::new(self.root.clone())
            .package_root(self.package_root())
            .include_extensions(self.config.include_extensions.clone())
            .exclude_globs(self.config.exclude_globs.clone())
            .respect_gitignore(self.config.respect_gitignore)
            .follow_symlinks(self.config.follow_symlinks)
            .max_depth(self.config.max_depth);
        let files = scanner.scan()?;
        Ok(files.into_iter().filter(|f| !deleter.is_deleted(&f.path)).collect())
    }

    /// Rewrite rules from config; these ride along in every sweep.
    fn rewrite_rules(&self) -> Vec<Box<dyn Rule>> {
        let mut rules: Vec<Box<dyn Rule>> = Vec::new();
        for pair in &self.config.rename_imports {
            rules.push(Box::new(RenameImportRule::new(&pair.from, &pair.to)));
        }
        for pair in &self.config.rename_tags {
            rules.push(Box::new(RenameTagRule::new(&pair.from, &pair.to)));
        }
        rules
    }

    /// Run the pipeline to its fixpoint.
    pub fn run(&self) -> Result<PipelineReport> {
        let seed_module = self
            .config
            .seed_module
            .clone()
            .context("a seed module is required to run the prune pipeline")?;

        let started_at = Utc::now();
        // Init: the ledger is the only persisted state and must not leak
        // from a previous run.
        let ledger = Ledger::create(&self.ledger_path())?;
        let deleter = Deleter::new(self.dry_run);
        let engine = RewriteEngine::new();
        let ctx = SweepContext {
            engine: &engine,
            ledger: &ledger,
            deleter: &deleter,
            show_progress: self.show_progress,
        };

        let files = self.scan(&deleter)?;
        info!(files = files.len(), %seed_module, "seed pass");
        let seed_report = seed::run(&files, &seed_module, self.rewrite_rules(), &ctx)?;
        info!(deleted = seed_report.deleted_count(), "seed pass complete");

        let mut rounds: Vec<RoundReport> = Vec::new();
        loop {
            let round = rounds.len() + 1;
            if round > self.config.max_rounds {
                bail!(
                    "closure did not converge within {} rounds; tree may be \
                     pathological or max_rounds too low",
                    self.config.max_rounds
                );
            }

            // The frontier is everything the previous round (or the seed
            // pass) recorded, snapshotted before the boundary marker.
            let frontier_entries = ledger.entries()?;
            let frontier = Frontier::new(frontier_entries.clone(), self.config.match_mode);
            ledger.mark_round_boundary()?;

            let files = self.scan(&deleter)?;
            info!(round, frontier = frontier.len(), files = files.len(), "closure pass");
            let pass = closure::run(round, &files, frontier, self.rewrite_rules(), &ctx)?;
            ledger.compact_to_latest_round()?;

            info!(round, deleted = pass.deleted_count(), "closure pass complete");
            rounds.push(RoundReport { round, frontier: frontier_entries, pass });

            if ledger.is_empty()? {
                break;
            }
        }

        Ok(PipelineReport {
            root: self.root.display().to_string(),
            seed_module,
            dry_run: self.dry_run,
            started_at,
            finished_at: Utc::now(),
            seed: seed_report,
            rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenamePair;
    use crate::domain::MatchMode;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const SEED: &str = "@toolkit/api";

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config() -> Config {
        Config {
            seed_module: Some(SEED.to_string()),
            respect_gitignore: false,
            ..Config::default()
        }
    }

    fn driver(root: &Path, config: Config) -> Driver {
        Driver::new(root.to_path_buf(), config, false)
    }

    /// The canonical three-round scenario: Foo imports the seed module, Bar
    /// imports Foo relatively, Baz imports Bar relatively. Unrelated files
    /// survive.
    fn scenario_tree(root: &Path) {
        write(root, "stores/Foo.ts", "import api from \"@toolkit/api\";\nexport const foo = api;\n");
        write(root, "widgets/Bar.tsx", "import { foo } from \"../stores/Foo\";\nexport const Bar = () => <div>{foo}</div>;\n");
        write(root, "widgets/Baz.tsx", "import { Bar } from \"../widgets/Bar\";\nexport const Baz = () => <Bar />;\n");
        write(root, "toolkit/url.ts", "export const wishURL = (p: string) => p;\n");
        write(root, "widgets/Safe.tsx", "import { wishURL } from \"../toolkit/url\";\nexport const Safe = () => <a href={wishURL(\"/\")} />;\n");
    }

    #[test]
    fn transitive_closure_deletes_the_whole_chain() {
        let tmp = TempDir::new().unwrap();
        scenario_tree(tmp.path());

        let report = driver(tmp.path(), config()).run().unwrap();

        // Seed pass removes Foo; rounds remove Bar then Baz; a final empty
        // round terminates the loop.
        assert_eq!(report.seed.deleted_count(), 1);
        assert_eq!(report.seed.deleted[0].specifier, "@stores/Foo");

        assert_eq!(report.rounds.len(), 3);
        assert_eq!(report.rounds[0].pass.deleted[0].specifier, "@widgets/Bar");
        assert_eq!(report.rounds[1].pass.deleted[0].specifier, "@widgets/Baz");
        assert_eq!(report.rounds[2].pass.deleted_count(), 0);

        assert!(!tmp.path().join("stores/Foo.ts").exists());
        assert!(!tmp.path().join("widgets/Bar.tsx").exists());
        assert!(!tmp.path().join("widgets/Baz.tsx").exists());

        // No premature deletion: unrelated files survive.
        assert!(tmp.path().join("toolkit/url.ts").exists());
        assert!(tmp.path().join("widgets/Safe.tsx").exists());
        assert_eq!(report.total_delete_failures(), 0);
    }

    #[test]
    fn one_hop_per_round_matches_prior_frontier() {
        let tmp = TempDir::new().unwrap();
        scenario_tree(tmp.path());

        let report = driver(tmp.path(), config()).run().unwrap();

        // Every deletion in round N matched an entry of round N's starting
        // frontier, never one appended during round N.
        for round in &report.rounds {
            for deleted in &round.pass.deleted {
                assert!(
                    round.frontier.iter().any(|f| f == &deleted.matched),
                    "round {} deleted {} via {}, which is not in its frontier {:?}",
                    round.round,
                    deleted.path,
                    deleted.matched,
                    round.frontier
                );
            }
        }
    }

    #[test]
    fn rerun_on_own_output_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        scenario_tree(tmp.path());

        driver(tmp.path(), config()).run().unwrap();
        let second = driver(tmp.path(), config()).run().unwrap();

        assert_eq!(second.total_deleted(), 0);
        assert_eq!(second.seed.deleted_count(), 0);
        // Seed finds nothing; the single closure round confirms emptiness.
        assert_eq!(second.rounds.len(), 1);
    }

    /// The prefix-collision tree: `stores/FooBar` depends on the seed and is
    /// deleted; `stores/Foo` is an unrelated module whose specifier is a
    /// textual prefix of the deleted one's ledger entry.
    fn prefix_collision_tree(root: &Path) {
        write(root, "stores/FooBar.ts", "import api from \"@toolkit/api\";\n");
        write(root, "stores/Foo.ts", "export const foo = 1;\n");
        write(root, "widgets/Near.ts", "import { foo } from \"../stores/Foo\";\n");
    }

    #[test]
    fn exact_matching_spares_prefix_collisions() {
        let tmp = TempDir::new().unwrap();
        prefix_collision_tree(tmp.path());

        let report = driver(tmp.path(), config()).run().unwrap();

        // Only FooBar goes: `@stores/Foo` is not an entry, merely a prefix
        // of one.
        assert_eq!(report.total_deleted(), 1);
        assert!(tmp.path().join("stores/Foo.ts").exists());
        assert!(tmp.path().join("widgets/Near.ts").exists());
    }

    #[test]
    fn substring_matching_reproduces_legacy_false_positive() {
        let tmp = TempDir::new().unwrap();
        prefix_collision_tree(tmp.path());

        let cfg = Config { match_mode: MatchMode::Substring, ..config() };
        driver(tmp.path(), cfg).run().unwrap();

        // Near's resolved import `@stores/Foo` occurs inside the ledger
        // entry `@stores/FooBar`, so compatibility mode wrongly deletes
        // Near. This is the documented legacy hazard.
        assert!(!tmp.path().join("widgets/Near.ts").exists());
        assert!(tmp.path().join("stores/Foo.ts").exists());
    }

    #[test]
    fn unparseable_file_is_skipped_not_deleted() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "stores/Foo.ts", "import api from \"@toolkit/api\";\n");
        write(tmp.path(), "widgets/Broken.ts", "import { from ;;; \"@toolkit/api\n");
        write(tmp.path(), "widgets/Ok.ts", "import { foo } from \"../stores/Foo\";\n");

        let report = driver(tmp.path(), config()).run().unwrap();

        // Broken never parses: skipped every pass, reported every pass,
        // still on disk.
        assert!(tmp.path().join("widgets/Broken.ts").exists());
        assert!(report.total_parse_failures() >= 1);
        assert!(report.seed.parse_failures.contains(&"widgets/Broken.ts".to_string()));

        // The parse failure did not stop the rest of the closure.
        assert!(!tmp.path().join("stores/Foo.ts").exists());
        assert!(!tmp.path().join("widgets/Ok.ts").exists());
    }

    #[test]
    fn dry_run_deletes_nothing_but_reports_everything() {
        let tmp = TempDir::new().unwrap();
        scenario_tree(tmp.path());

        let report = Driver::new(tmp.path().to_path_buf(), config(), true).run().unwrap();

        assert!(report.dry_run);
        assert_eq!(report.total_deleted(), 3);
        // Same round structure as the destructive run.
        assert_eq!(report.rounds.len(), 3);
        assert!(tmp.path().join("stores/Foo.ts").exists());
        assert!(tmp.path().join("widgets/Bar.tsx").exists());
        assert!(tmp.path().join("widgets/Baz.tsx").exists());
    }

    #[test]
    fn package_root_scopes_canonical_specifiers() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "src/pkg/stores/Foo.ts",
            "import api from \"@toolkit/api\";\n",
        );
        write(
            tmp.path(),
            "src/pkg/widgets/Bar.ts",
            "import { foo } from \"@stores/Foo\";\n",
        );

        let cfg = Config { package_root: Some("src/pkg".into()), ..config() };
        let report = driver(tmp.path(), cfg).run().unwrap();

        assert_eq!(report.seed.deleted[0].specifier, "@stores/Foo");
        // Bar's alias import matches Foo's canonical specifier exactly.
        assert!(!tmp.path().join("src/pkg/widgets/Bar.ts").exists());
    }

    #[test]
    fn rename_rules_persist_edits_in_surviving_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "stores/Foo.ts", "import api from \"@toolkit/api\";\n");
        write(
            tmp.path(),
            "widgets/Kept.ts",
            "import thing from \"@plus/old/Thing\";\nexport default thing;\n",
        );

        let cfg = Config {
            rename_imports: vec![RenamePair { from: "@plus/old".into(), to: "@plus/new".into() }],
            ..config()
        };
        let report = driver(tmp.path(), cfg).run().unwrap();

        assert!(report.seed.files_rewritten >= 1);
        let kept = fs::read_to_string(tmp.path().join("widgets/Kept.ts")).unwrap();
        assert!(kept.contains("@plus/new/Thing"));
        assert!(!kept.contains("@plus/old"));
    }

    #[test]
    fn seed_subpath_imports_are_seeds_too() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "orders/Detail.ts", "import detail from \"@toolkit/api/orders\";\n");
        write(tmp.path(), "orders/List.ts", "import x from \"@toolkit/api-next\";\n");

        let report = driver(tmp.path(), config()).run().unwrap();

        assert_eq!(report.seed.deleted_count(), 1);
        assert_eq!(report.seed.deleted[0].path, "orders/Detail.ts");
        // Similar-prefix package is not the seed module.
        assert!(tmp.path().join("orders/List.ts").exists());
    }

    #[test]
    fn missing_seed_module_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let cfg = Config { seed_module: None, ..Config::default() };
        let err = driver(tmp.path(), cfg).run().unwrap_err();
        assert!(err.to_string().contains("seed module"));
    }

    #[test]
    fn max_rounds_cap_stops_non_convergence() {
        let tmp = TempDir::new().unwrap();
        // A long chain: c0 imports the seed, c1 imports c0, ... c5 imports c4.
        write(tmp.path(), "chain/c0.ts", "import api from \"@toolkit/api\";\n");
        for i in 1..6 {
            write(
                tmp.path(),
                &format!("chain/c{i}.ts"),
                &format!("import prev from \"./c{}\";\n", i - 1),
            );
        }

        // Five closure deletions need six rounds (five deleting, one empty);
        // capping at 3 must fail loudly instead of stopping quietly.
        let cfg = Config { max_rounds: 3, ..config() };
        let err = driver(tmp.path(), cfg).run().unwrap_err();
        assert!(err.to_string().contains("did not converge"));

        // With the default cap the same tree converges.
        let tmp2 = TempDir::new().unwrap();
        write(tmp2.path(), "chain/c0.ts", "import api from \"@toolkit/api\";\n");
        for i in 1..6 {
            write(
                tmp2.path(),
                &format!("chain/c{i}.ts"),
                &format!("import prev from \"./c{}\";\n", i - 1),
            );
        }
        let report = driver(tmp2.path(), config()).run().unwrap();
        assert_eq!(report.total_deleted(), 6);
        assert_eq!(report.rounds.len(), 6);
    }

    #[test]
    fn export_from_counts_as_a_dependency() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "stores/Foo.ts", "import api from \"@toolkit/api\";\n");
        write(tmp.path(), "stores/index.ts", "export { foo } from \"./Foo\";\n");

        let report = driver(tmp.path(), config()).run().unwrap();

        assert_eq!(report.total_deleted(), 2);
        assert!(!tmp.path().join("stores/index.ts").exists());
    }
}
