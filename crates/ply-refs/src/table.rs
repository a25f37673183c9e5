//! Ref bookkeeping shared by the in-memory and file stores.

use std::collections::BTreeMap;

use tracing::debug;

use ply_types::Hash;

use crate::error::{RefError, RefResult};
use crate::names::{validate_branch_name, validate_tag_name};
use crate::types::{Ref, RepoState};

#[derive(Clone, Debug, Default)]
pub(crate) struct RefTable {
    pub(crate) refs: BTreeMap<String, Ref>,
    pub(crate) state: Option<RepoState>,
}

impl RefTable {
    pub(crate) fn read(&self, name: &str) -> Option<Ref> {
        self.refs.get(name).cloned()
    }

    pub(crate) fn write(&mut self, name: &str, reference: &Ref) -> RefResult<()> {
        match reference {
            Ref::Branch { name: short, .. } => validate_branch_name(short)?,
            Ref::Tag { name: short, .. } => validate_tag_name(short)?,
        }
        if let Some(existing) = self.refs.get(name) {
            if existing.is_tag() {
                return Err(RefError::TagImmutable {
                    name: name.to_string(),
                });
            }
        }
        debug!(name, target = %reference.target_hash().short_hex(), "write ref");
        self.refs.insert(name.to_string(), reference.clone());
        Ok(())
    }

    pub(crate) fn compare_and_set(
        &mut self,
        name: &str,
        expected: Option<Hash>,
        reference: &Ref,
    ) -> RefResult<()> {
        let actual = self.refs.get(name).map(Ref::target_hash);
        if actual != expected {
            return Err(RefError::StaleRef {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        self.write(name, reference)
    }

    pub(crate) fn delete(&mut self, name: &str) -> RefResult<bool> {
        if let Some(state) = &self.state {
            if name == state.head_ref_name() {
                return Err(RefError::DeleteCurrentBranch {
                    name: state.head.clone(),
                });
            }
        }
        Ok(self.refs.remove(name).is_some())
    }

    pub(crate) fn list(&self, prefix: &str) -> Vec<(String, Ref)> {
        self.refs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn init_state(&mut self, state: RepoState) -> RefResult<()> {
        if self.state.is_some() {
            return Err(RefError::AlreadyExists {
                name: "repo state".into(),
            });
        }
        validate_branch_name(&state.head)?;
        self.state = Some(state);
        Ok(())
    }

    pub(crate) fn update_state(&mut self, expected: &RepoState, new: RepoState) -> RefResult<()> {
        match &self.state {
            None => Err(RefError::NoRepoState),
            Some(current) if current != expected => Err(RefError::StaleState),
            Some(_) => {
                validate_branch_name(&new.head)?;
                debug!(
                    head = %new.head,
                    working = %new.working.short_hex(),
                    staged = %new.staged.short_hex(),
                    merging = new.merge.is_some(),
                    "update repo state"
                );
                self.state = Some(new);
                Ok(())
            }
        }
    }
}
