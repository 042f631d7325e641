//! Package backend adapter over pacman

use anyhow::{Result, anyhow};
use hostkit::{PackageInfo, Pacman};
use reconcile::{
    CallContext, EntryError, ObservedPackage, PackageBackend, PackageTransaction, SlotGuard,
    TransactionSlot,
};

use super::engine_error;

const SUBSYSTEM: &str = "package database";

/// `PackageBackend` backed by [`hostkit::Pacman`]
///
/// Holds the transaction slot, so one backend never has two transactions
/// open at once even before pacman's own lock file is taken.
#[derive(Debug)]
pub struct PacmanBackend {
    pacman: Pacman,
    slot: TransactionSlot,
}

impl PacmanBackend {
    pub fn new(bin: &str, sudo: bool) -> Self {
        Self::from_pacman(Pacman::new().with_binary(bin).with_sudo(sudo))
    }

    pub fn from_pacman(pacman: Pacman) -> Self {
        Self {
            pacman,
            slot: TransactionSlot::new(),
        }
    }
}

impl PackageBackend for PacmanBackend {
    fn list_installed(&self, ctx: &CallContext) -> Result<Vec<ObservedPackage>> {
        let packages = self
            .pacman
            .list_installed(Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))?;
        Ok(packages.into_iter().map(observed_package).collect())
    }

    fn list_remote(&self, ctx: &CallContext, names: &[String]) -> Result<Vec<ObservedPackage>> {
        let packages = self
            .pacman
            .list_remote(names, Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))?;
        Ok(packages.into_iter().map(observed_package).collect())
    }

    fn begin(&self, ctx: &CallContext) -> Result<Box<dyn PackageTransaction + '_>> {
        ctx.checkpoint()?;
        let guard = self.slot.try_acquire()?;
        let tx = self
            .pacman
            .transaction()
            .map_err(|e| engine_error(SUBSYSTEM, e))?;
        log::debug!("Opened package transaction");
        Ok(Box::new(PacmanTransaction {
            tx: Some(tx),
            guard: Some(guard),
        }))
    }
}

/// Open pacman batch plus the slot it holds
struct PacmanTransaction<'a> {
    tx: Option<hostkit::Transaction<'a>>,
    guard: Option<SlotGuard<'a>>,
}

impl<'a> PacmanTransaction<'a> {
    fn open(&mut self) -> Result<&mut hostkit::Transaction<'a>> {
        self.tx
            .as_mut()
            .ok_or_else(|| anyhow!("package transaction already released"))
    }
}

impl PackageTransaction for PacmanTransaction<'_> {
    fn stage(&mut self, ctx: &CallContext, package: &ObservedPackage) -> Result<()> {
        ctx.checkpoint()?;
        self.open()?
            .add(&package.name, package.repository.as_deref());
        Ok(())
    }

    fn prepare(&mut self, ctx: &CallContext) -> Result<()> {
        let tx = self.open()?;
        match tx.prepare(Some(ctx.interrupt())) {
            Ok(resolved) => {
                log::debug!(
                    "Batch resolves to {}",
                    resolved
                        .iter()
                        .map(|p| format!("{}-{}", p.name, p.version))
                        .collect::<Vec<_>>()
                        .join(" ")
                );
                Ok(())
            }
            Err(hostkit::Error::NotFound { name }) => Err(EntryError {
                name,
                message: "target not found".to_string(),
            }
            .into()),
            Err(e) => Err(engine_error(SUBSYSTEM, e)),
        }
    }

    fn commit(&mut self, _ctx: &CallContext) -> Result<()> {
        self.open()?
            .commit()
            .map_err(|e| engine_error(SUBSYSTEM, e))
    }

    fn release(&mut self) {
        self.tx = None;
        if self.guard.take().is_some() {
            log::debug!("Released package transaction");
        }
    }
}

fn observed_package(info: PackageInfo) -> ObservedPackage {
    let package = ObservedPackage::new(info.name, info.version);
    match info.repository {
        Some(repo) => package.from_repository(repo),
        None => package,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn backend(dir: &tempfile::TempDir) -> PacmanBackend {
        PacmanBackend::from_pacman(Pacman::new().with_lock_file(dir.path().join("db.lck")))
    }

    #[test]
    fn test_observed_package_keeps_repository() {
        let remote = observed_package(PackageInfo::remote("extra", "htop", "3.3.0-1"));
        assert_eq!(remote, ObservedPackage::new("htop", "3.3.0-1").from_repository("extra"));

        let local = observed_package(PackageInfo::installed("bash", "5.2.026-2"));
        assert_eq!(local.repository, None);
    }

    #[test]
    fn test_second_begin_is_locked_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let ctx = CallContext::new();

        let mut first = backend.begin(&ctx).unwrap();
        let err = backend.begin(&ctx).err().unwrap();
        let typed = err.downcast_ref::<reconcile::Error>().unwrap();
        assert_eq!(typed.kind(), reconcile::ErrorKind::Locked);

        first.release();
        drop(first);
        assert!(backend.begin(&ctx).is_ok());
    }

    #[test]
    fn test_lock_file_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("db.lck"), "").unwrap();
        let backend = backend(&dir);

        let err = backend.begin(&CallContext::new()).err().unwrap();
        let typed = err.downcast_ref::<reconcile::Error>().unwrap();
        assert_eq!(typed.kind(), reconcile::ErrorKind::Locked);
        // The failed begin gave the slot back
        assert!(!backend.slot.is_held());
    }

    #[test]
    fn test_released_transaction_refuses_work() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let ctx = CallContext::new();

        let mut tx = backend.begin(&ctx).unwrap();
        tx.release();
        assert!(tx.stage(&ctx, &ObservedPackage::new("htop", "3.3.0-1")).is_err());
        assert!(tx.commit(&ctx).is_err());
    }

    #[test]
    fn test_stage_pins_repository() {
        let dir = tempfile::tempdir().unwrap();
        let pacman = Pacman::new().with_lock_file(dir.path().join("db.lck"));
        let ctx = CallContext::new();
        let mut tx = PacmanTransaction {
            tx: Some(pacman.transaction().unwrap()),
            guard: None,
        };

        tx.stage(&ctx, &ObservedPackage::new("bash", "5.2.037-2").from_repository("testing"))
            .unwrap();
        tx.stage(&ctx, &ObservedPackage::new("htop", "3.3.0-1")).unwrap();
        assert_eq!(tx.open().unwrap().targets(), ["testing/bash", "htop"]);
    }

    #[test]
    fn test_begin_after_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let ctx = CallContext::new();
        ctx.cancel_token().cancel();

        let err = backend.begin(&ctx).err().unwrap();
        let typed = err.downcast_ref::<reconcile::Error>().unwrap();
        assert_eq!(typed.kind(), reconcile::ErrorKind::Cancelled);
    }
}
