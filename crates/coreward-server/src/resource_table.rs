//! Fixed-size core ownership table.
//!
//! A flat vector of optional client identifiers, indexed by physical
//! core id — never a graph of pointers back and forth between clients
//! and cores. Clients separately track their own ordered `assigned_cores`
//! set; every mutation here is mirrored by the caller on that side in
//! the same handler.

use coreward_types::{ClientId, CoreId};

use crate::error::{ServerError, ServerResult};

pub struct ResourceTable {
    slots: Vec<Option<ClientId>>,
}

impl ResourceTable {
    pub fn new(max_cores: usize) -> Self {
        Self { slots: vec![None; max_cores] }
    }

    pub fn max_cores(&self) -> usize {
        self.slots.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn owner(&self, core: CoreId) -> Option<ClientId> {
        self.slots.get(core.index()).copied().flatten()
    }

    /// Free core ids, highest index first — the order the synchronous
    /// reconciler claims from.
    pub fn free_cores_high_to_low(&self) -> impl Iterator<Item = CoreId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| CoreId::from(index))
    }

    /// Free core ids, lowest index first — the order the asynchronous
    /// reconciler claims from.
    pub fn free_cores_low_to_high(&self) -> impl Iterator<Item = CoreId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| CoreId::from(index))
    }

    pub fn assign(&mut self, core: CoreId, client: ClientId) -> ServerResult<()> {
        match self.slots[core.index()] {
            None => {
                self.slots[core.index()] = Some(client);
                Ok(())
            }
            Some(owner) => Err(ServerError::CoreAlreadyOwned { core, owner, claimant: client }),
        }
    }

    pub fn release(&mut self, core: CoreId, client: ClientId) -> ServerResult<()> {
        match self.slots[core.index()] {
            Some(owner) if owner == client => {
                self.slots[core.index()] = None;
                Ok(())
            }
            _ => Err(ServerError::ReleaseNotOwned { client, core }),
        }
    }

    /// Frees every core owned by `client`, regardless of how many; used
    /// on `CLIENT_SHUTDOWN` and when rebuilding a client's set from a
    /// `CLIENT_REINVADE_ACK_NONBLOCKING`.
    pub fn release_all_for(&mut self, client: ClientId) {
        for slot in &mut self.slots {
            if *slot == Some(client) {
                *slot = None;
            }
        }
    }

    /// One row per core: `core index -> owner`, used by the `-99`
    /// tabular verbosity tier.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (index, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(owner) => out.push_str(&format!("core{index:<4}{owner}\n")),
                None => out.push_str(&format!("core{index:<4}FREE\n")),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreward_types::ClientId;

    #[test]
    fn assign_then_owner_reports_the_client() {
        let mut table = ResourceTable::new(4);
        table.assign(CoreId(0), ClientId(1)).unwrap();
        assert_eq!(table.owner(CoreId(0)), Some(ClientId(1)));
    }

    #[test]
    fn double_assign_is_rejected() {
        let mut table = ResourceTable::new(4);
        table.assign(CoreId(0), ClientId(1)).unwrap();
        let err = table.assign(CoreId(0), ClientId(2)).unwrap_err();
        assert!(matches!(err, ServerError::CoreAlreadyOwned { .. }));
    }

    #[test]
    fn release_by_non_owner_is_rejected() {
        let mut table = ResourceTable::new(4);
        table.assign(CoreId(0), ClientId(1)).unwrap();
        let err = table.release(CoreId(0), ClientId(2)).unwrap_err();
        assert!(matches!(err, ServerError::ReleaseNotOwned { .. }));
    }

    #[test]
    fn free_cores_high_to_low_skips_occupied_slots() {
        let mut table = ResourceTable::new(4);
        table.assign(CoreId(3), ClientId(1)).unwrap();
        let free: Vec<CoreId> = table.free_cores_high_to_low().collect();
        assert_eq!(free, vec![CoreId(2), CoreId(1), CoreId(0)]);
    }

    #[test]
    fn free_cores_low_to_high_skips_occupied_slots() {
        let mut table = ResourceTable::new(4);
        table.assign(CoreId(0), ClientId(1)).unwrap();
        let free: Vec<CoreId> = table.free_cores_low_to_high().collect();
        assert_eq!(free, vec![CoreId(1), CoreId(2), CoreId(3)]);
    }

    #[test]
    fn release_all_for_clears_every_owned_slot() {
        let mut table = ResourceTable::new(4);
        table.assign(CoreId(0), ClientId(1)).unwrap();
        table.assign(CoreId(2), ClientId(1)).unwrap();
        table.assign(CoreId(1), ClientId(2)).unwrap();
        table.release_all_for(ClientId(1));
        assert_eq!(table.owner(CoreId(0)), None);
        assert_eq!(table.owner(CoreId(2)), None);
        assert_eq!(table.owner(CoreId(1)), Some(ClientId(2)));
    }
}
