//! Ingest and egress orchestration for the secret archive.
//!
//! A [`Vault`] sequences the stages of both directions:
//!
//! ```text
//! ingest:  reconcile -> resolve -> containerize? -> compress -> encrypt -> register
//! egress:  decrypt -> decompress -> extract? -> deregister -> reconcile
//! ```
//!
//! Intermediate artifacts live in a per-run [`Staging`] directory that is
//! removed on every exit path. The vault object is written before its
//! registry entry, so a crash between the two leaves an orphan that
//! [`reconcile`] reports, never an entry pointing at nothing. Egress removes
//! the entry only after the output is in place.
//!
//! Operator interaction stays outside: [`Vault::plan_ingest`] returns any name
//! collision as data and the caller passes the decision back in.

pub mod config;
pub mod error;
pub mod force;
pub mod reconcile;
pub mod source;
pub mod stage;
pub mod staging;
pub mod vault;

pub use config::{VaultConfig, VaultLayout};
pub use error::{ErrorKind, PipelineError, PipelineResult, StageFailure};
pub use force::{ForceOutcome, ForceStage};
pub use reconcile::{list_storage, reconcile, DriftReport};
pub use source::{split_extension, SourceInfo};
pub use stage::{Stage, StageResult};
pub use staging::Staging;
pub use vault::{EgressReport, IngestPlan, IngestReport, Vault};

#[cfg(test)]
mod tests {
    use super::*;
    use sarc_crypto::{Cipher, CryptoError, CryptoResult, KeyHandle};
    use sarc_registry::{ConflictChoice, InMemoryBackend, Resolution};
    use sarc_types::CompressionMethod;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    struct FailingCipher;

    impl Cipher for FailingCipher {
        fn encrypt(&self, _src: &Path, _dst: &Path) -> CryptoResult<KeyHandle> {
            Err(CryptoError::EncryptionFailed("injected failure".into()))
        }

        fn decrypt(&self, _src: &Path, _dst: &Path) -> CryptoResult<KeyHandle> {
            Err(CryptoError::AuthenticationFailed("injected failure".into()))
        }
    }

    fn never(_: &sarc_registry::NameConflict) -> ConflictChoice {
        panic!("unexpected name conflict")
    }

    fn config(root: &Path) -> VaultConfig {
        VaultConfig {
            lock_timeout_ms: 100,
            ..VaultConfig::for_root(root)
        }
    }

    fn names_in(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn import_file(vault: &Vault, name: &str, data: &[u8]) -> PathBuf {
        let path = vault.layout().import_dir().join(name);
        fs::write(&path, data).unwrap();
        path
    }

    fn import_docs(vault: &Vault) -> PathBuf {
        let docs = vault.layout().import_dir().join("docs");
        fs::create_dir_all(docs.join("notes")).unwrap();
        fs::write(docs.join("a.txt"), b"first file").unwrap();
        fs::write(docs.join("b.bin"), [0u8, 159, 146, 150]).unwrap();
        fs::write(docs.join("notes/c.md"), b"# third\n").unwrap();
        docs
    }

    #[test]
    fn directory_roundtrip_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        import_docs(&vault);

        let source = vault.locate_source(Path::new("docs"));
        let report = vault
            .ingest_with(&source, None, CompressionMethod::Gz, never)
            .unwrap();
        assert_eq!(report.name, "docs");
        assert!(!report.replaced);
        assert!(report.drift.is_clean());

        let document: serde_json::Value =
            serde_json::from_slice(&fs::read(vault.layout().registry_path()).unwrap()).unwrap();
        assert_eq!(
            document,
            serde_json::json!({"docs": {"ext": "", "method": "gz", "is_dir": true}})
        );
        assert_eq!(names_in(&vault.layout().vault_dir()), BTreeSet::from(["docs".to_string()]));

        let egress = vault.egress("docs").unwrap();
        let out = vault.layout().out_dir().join("docs");
        assert_eq!(egress.output, out);
        assert!(vault.registry().is_empty());
        assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"first file");
        assert_eq!(fs::read(out.join("b.bin")).unwrap(), [0u8, 159, 146, 150]);
        assert_eq!(fs::read(out.join("notes/c.md")).unwrap(), b"# third\n");
        assert!(names_in(&vault.layout().vault_dir()).is_empty());
        assert_eq!(names_in(&vault.layout().out_dir()), BTreeSet::from(["docs".to_string()]));
        assert!(names_in(&vault.layout().staging_dir()).is_empty());
        assert!(egress.drift.is_clean());
    }

    #[test]
    fn file_roundtrip_restores_extension() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        let source = import_file(&vault, "report.txt", b"quarterly numbers\n");

        for method in CompressionMethod::ALL {
            let report = vault.ingest_with(&source, None, method, never).unwrap();
            assert_eq!(report.entry, sarc_types::RegistryEntry::file("txt", method));
            let egress = vault.egress("report").unwrap();
            assert_eq!(egress.output, vault.layout().out_dir().join("report.txt"));
            assert_eq!(fs::read(&egress.output).unwrap(), b"quarterly numbers\n");
            fs::remove_file(&egress.output).unwrap();
        }
    }

    #[test]
    fn failing_encryptor_leaves_no_trace() {
        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let mut vault = Vault::with_backend(
            config(root.path()),
            Box::new(backend.clone()),
            Box::new(FailingCipher),
        )
        .unwrap();
        let docs = import_docs(&vault);

        let err = vault
            .ingest_with(&docs, None, CompressionMethod::Xz, never)
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Encrypting));
        assert_eq!(err.object(), Some("docs"));
        assert!(!vault.registry().contains("docs"));
        assert!(backend.document().is_none());
        assert!(names_in(&vault.layout().vault_dir()).is_empty());
        assert!(names_in(&vault.layout().staging_dir()).is_empty());
    }

    #[test]
    fn failed_registry_write_removes_new_object() {
        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let cipher = sarc_crypto::StreamCipher::new(sarc_crypto::KeyRing::new(root.path().join("keys")));
        let mut vault =
            Vault::with_backend(config(root.path()), Box::new(backend.clone()), Box::new(cipher)).unwrap();
        let source = import_file(&vault, "note.md", b"v1");
        vault
            .ingest_with(&source, None, CompressionMethod::Gz, never)
            .unwrap();
        let original = fs::read(vault.layout().object_path("note")).unwrap();

        backend.set_fail_writes(true);
        fs::write(&source, b"v2").unwrap();
        let err = vault
            .ingest_with(&source, None, CompressionMethod::Gz, |_| ConflictChoice::Replace)
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Registering));
        assert_eq!(fs::read(vault.layout().object_path("note")).unwrap(), original);

        let err = vault
            .ingest_with(&source, Some("fresh"), CompressionMethod::Gz, never)
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Registering));
        assert_eq!(
            names_in(&vault.layout().vault_dir()),
            BTreeSet::from(["note".to_string()])
        );
    }

    #[test]
    fn collisions_replace_or_keep_both() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        let source = import_file(&vault, "report.txt", b"one");
        vault
            .ingest_with(&source, None, CompressionMethod::Gz, never)
            .unwrap();

        fs::write(&source, b"two").unwrap();
        let kept = vault
            .ingest_with(&source, None, CompressionMethod::Gz, |conflict| {
                assert_eq!(conflict.existing.describe(), ".txt file");
                ConflictChoice::KeepBoth
            })
            .unwrap();
        assert_eq!(kept.name, "report (1)");

        fs::write(&source, b"three").unwrap();
        let replaced = vault
            .ingest_with(&source, None, CompressionMethod::Zstd, |_| ConflictChoice::Replace)
            .unwrap();
        assert!(replaced.replaced);
        assert_eq!(replaced.name, "report");
        assert_eq!(vault.registry().len(), 2);
        assert_eq!(
            names_in(&vault.layout().vault_dir()),
            BTreeSet::from(["report".to_string(), "report (1)".to_string()])
        );

        let restored = vault.egress("report").unwrap();
        assert_eq!(fs::read(restored.output).unwrap(), b"three");
    }

    #[test]
    fn unsettled_conflict_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        let source = import_file(&vault, "a.txt", b"x");
        vault
            .ingest_with(&source, None, CompressionMethod::Gz, never)
            .unwrap();

        let plan = vault.plan_ingest(&source, None).unwrap();
        let alternate = match &plan.resolution {
            Resolution::Conflict(conflict) => conflict.alternate.clone(),
            Resolution::Free(_) => panic!("expected conflict"),
        };
        assert_eq!(alternate, "a (1)");
        let err = vault.ingest(plan, None, CompressionMethod::Gz).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName);
        assert_eq!(vault.registry().len(), 1);
    }

    #[test]
    fn deleted_object_is_reported_dangling_and_not_repaired() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        let source = import_file(&vault, "diary.txt", b"dear diary");
        vault
            .ingest_with(&source, None, CompressionMethod::Gz, never)
            .unwrap();
        fs::remove_file(vault.layout().object_path("diary")).unwrap();

        let drift = vault.reconcile().unwrap();
        assert_eq!(drift.dangling, BTreeSet::from(["diary".to_string()]));
        assert!(drift.orphaned.is_empty());
        assert!(vault.registry().contains("diary"));

        let err = vault.egress("diary").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(vault.registry().contains("diary"));

        assert_eq!(vault.prune_dangling().unwrap(), vec!["diary".to_string()]);
        assert!(vault.registry().is_empty());
    }

    #[test]
    fn orphans_are_reported_and_kept() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        fs::write(vault.layout().object_path("stray"), b"left behind").unwrap();

        let plan = vault.plan_ingest(&import_file(&vault, "x.txt", b"x"), None).unwrap();
        assert_eq!(plan.drift.orphaned, BTreeSet::from(["stray".to_string()]));
        assert!(vault.prune_dangling().unwrap().is_empty());
        assert!(vault.layout().object_path("stray").exists());
    }

    #[test]
    fn missing_key_fails_egress_without_side_effects() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        let source = import_file(&vault, "secret.txt", b"hunter2");
        let report = vault
            .ingest_with(&source, None, CompressionMethod::Gz, never)
            .unwrap();
        fs::remove_file(vault.layout().keys_dir().join(format!("{}.key", report.key))).unwrap();

        let err = vault.egress("secret").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
        assert_eq!(err.stage(), Some(Stage::Decrypting));
        assert!(vault.registry().contains("secret"));
        assert!(vault.layout().object_path("secret").exists());
        assert!(names_in(&vault.layout().out_dir()).is_empty());
    }

    #[test]
    fn egress_never_overwrites_output() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        let source = import_file(&vault, "report.txt", b"vaulted");
        vault
            .ingest_with(&source, None, CompressionMethod::Gz, never)
            .unwrap();
        let existing = vault.layout().out_dir().join("report.txt");
        fs::write(&existing, b"operator's own").unwrap();

        let egress = vault.egress("report").unwrap();
        assert_eq!(egress.output, vault.layout().out_dir().join("report (1).txt"));
        assert_eq!(fs::read(&existing).unwrap(), b"operator's own");
        assert_eq!(fs::read(&egress.output).unwrap(), b"vaulted");
    }

    #[test]
    fn unknown_entry_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        let err = vault.egress("nothing").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownEntry(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn second_open_is_locked_out() {
        let root = tempfile::tempdir().unwrap();
        let _held = Vault::open_local(config(root.path())).unwrap();
        let err = Vault::open_local(config(root.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
        assert_eq!(err.stage(), Some(Stage::Opening));
    }

    #[test]
    fn corrupt_registry_refuses_to_open() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());
        fs::write(config.layout.registry_path(), b"{\"docs\": ").unwrap();
        let err = Vault::open_local(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptRegistry);
    }

    #[test]
    fn stale_staging_is_swept_on_open() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());
        let stale = config.layout.staging_dir().join("run-crashed");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("sealed"), b"partial").unwrap();
        let _vault = Vault::open_local(config).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn forced_stages_roundtrip_without_registry() {
        let root = tempfile::tempdir().unwrap();
        let vault = Vault::open_local(config(root.path())).unwrap();
        let docs = import_docs(&vault);
        let out = vault.layout().out_dir();

        let tar = vault.force(ForceStage::Containerize, &docs, None, None).unwrap();
        assert_eq!(tar.output, out.join("docs.tar"));

        let xz = vault
            .force(ForceStage::Compress, &tar.output, None, Some(CompressionMethod::Xz))
            .unwrap();
        assert_eq!(xz.output, out.join("docs.tar.xz"));

        let sealed = vault.force(ForceStage::Encrypt, &xz.output, None, None).unwrap();
        assert_eq!(sealed.output, out.join("docs.tar.xz.sarc"));

        let opened = vault.force(ForceStage::Decrypt, &sealed.output, None, None).unwrap();
        assert_eq!(opened.key, sealed.key);
        assert_eq!(opened.output, out.join("docs.tar (1).xz"));

        let plain = vault.force(ForceStage::Decompress, &opened.output, None, None).unwrap();
        assert_eq!(plain.method, Some(CompressionMethod::Xz));
        assert_eq!(fs::read(&plain.output).unwrap(), fs::read(&tar.output).unwrap());

        let extracted = vault
            .force(ForceStage::Extract, &tar.output, Some(root.path().join("restored").as_path()), None)
            .unwrap();
        assert_eq!(fs::read(extracted.output.join("notes/c.md")).unwrap(), b"# third\n");

        assert!(vault.registry().is_empty());
        assert!(names_in(&vault.layout().vault_dir()).is_empty());
    }

    #[test]
    fn forced_decompress_rejects_unknown_format() {
        let root = tempfile::tempdir().unwrap();
        let vault = Vault::open_local(config(root.path())).unwrap();
        let input = import_file(&vault, "mystery.bin", b"no magic here");
        let err = vault.force(ForceStage::Decompress, &input, None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedMethod);
    }

    #[test]
    fn forced_stage_refuses_existing_output() {
        let root = tempfile::tempdir().unwrap();
        let vault = Vault::open_local(config(root.path())).unwrap();
        let input = import_file(&vault, "a.txt", b"a");
        let taken = root.path().join("taken");
        fs::write(&taken, b"keep").unwrap();
        let err = vault
            .force(ForceStage::Compress, &input, Some(taken.as_path()), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(fs::read(&taken).unwrap(), b"keep");
    }

    #[test]
    fn orphan_in_the_way_is_never_overwritten() {
        let root = tempfile::tempdir().unwrap();
        let mut vault = Vault::open_local(config(root.path())).unwrap();
        let orphan = vault.layout().object_path("report");
        fs::write(&orphan, b"sealed by a crashed run").unwrap();
        let source = import_file(&vault, "report.txt", b"new contents");

        let plan = vault.plan_ingest(&source, None).unwrap();
        assert_eq!(plan.drift.orphaned, BTreeSet::from(["report".to_string()]));
        assert!(plan.conflict().is_none());
        let err = vault.ingest(plan, None, CompressionMethod::Gz).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Resolving));
        assert!(matches!(
            err,
            PipelineError::Stage { source: StageFailure::OutputExists(_), .. }
        ));
        assert_eq!(fs::read(&orphan).unwrap(), b"sealed by a crashed run");
        assert!(vault.registry().is_empty());
        assert!(names_in(&vault.layout().staging_dir()).is_empty());

        let report = vault
            .ingest_with(&source, Some("report-new"), CompressionMethod::Gz, never)
            .unwrap();
        assert_eq!(report.name, "report-new");
        assert_eq!(fs::read(&orphan).unwrap(), b"sealed by a crashed run");
    }

    #[test]
    fn escaping_container_fails_egress_without_side_effects() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());
        let cipher = sarc_crypto::StreamCipher::new(sarc_crypto::KeyRing::new(config.layout.keys_dir()));
        let backend = InMemoryBackend::with_document(
            br#"{"evil": {"ext": "", "method": "gz", "is_dir": true}}"#.to_vec(),
        );
        let mut vault =
            Vault::with_backend(config, Box::new(backend), Box::new(cipher.clone())).unwrap();

        let work = tempfile::tempdir().unwrap();
        let container = work.path().join("evil.tar");
        let mut builder = tar::Builder::new(fs::File::create(&container).unwrap());
        for (name, data) in [(&b"fine.txt"[..], &b"ok"[..]), (&b"../escape.txt"[..], &b"pwned"[..])] {
            let mut header = tar::Header::new_old();
            header.as_old_mut().name[..name.len()].copy_from_slice(name);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, data).unwrap();
        }
        builder.finish().unwrap();
        drop(builder);
        let compressed = work.path().join("evil.tar.gz");
        sarc_codec::compress_file(&container, &compressed, CompressionMethod::Gz).unwrap();
        let object = vault.layout().object_path("evil");
        cipher.encrypt(&compressed, &object).unwrap();
        let sealed = fs::read(&object).unwrap();

        let err = vault.egress("evil").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathTraversal);
        assert_eq!(err.stage(), Some(Stage::Extracting));
        assert!(vault.registry().contains("evil"));
        assert_eq!(fs::read(&object).unwrap(), sealed);
        assert!(names_in(&vault.layout().out_dir()).is_empty());
        assert!(!root.path().join("escape.txt").exists());
        assert!(names_in(&vault.layout().staging_dir()).is_empty());
    }
}
