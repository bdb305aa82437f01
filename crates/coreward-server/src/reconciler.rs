//! Moves the current assignment toward the optimizer's target.
//!
//! Two procedures, matching two different promises to the client: the
//! synchronous path may evict cores unilaterally because its caller is
//! a blocking request the client is suspended on; the asynchronous path
//! must propose and wait for an ack before a core changes hands, and
//! gates on `reinvade_nonblocking_active` so at most one proposal is
//! outstanding per client.

use coreward_transport::ServerTransport;
use coreward_types::CoreId;

use crate::client::ClientRecord;
use crate::error::ServerResult;
use crate::messenger::Messenger;
use crate::resource_table::ResourceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Changed,
}

/// Synchronous reconciler: `apply_new_optimum_sync`.
pub fn apply_sync(table: &mut ResourceTable, client: &mut ClientRecord, optimal: u32) -> ServerResult<Outcome> {
    let current = client.number_of_assigned_cores() as i64;
    let delta = i64::from(optimal) - current;

    if delta == 0 {
        return Ok(Outcome::Unchanged);
    }

    if delta > 0 {
        let claims: Vec<CoreId> = table.free_cores_high_to_low().take(delta as usize).collect();
        if claims.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        for core in &claims {
            table.assign(*core, client.client_id)?;
        }
        for core in claims {
            client.add_assigned_core(core);
        }
        return Ok(Outcome::Changed);
    }

    let released = client.drop_highest((-delta) as usize);
    for core in released {
        table.release(core, client.client_id)?;
    }
    Ok(Outcome::Changed)
}

/// Asynchronous reconciler: `apply_new_optimum_async`. Returns `Ok(())`
/// whether or not a proposal was actually sent — callers that need to
/// know should inspect `client.reinvade_nonblocking_active`.
pub fn apply_async(
    table: &mut ResourceTable,
    client: &mut ClientRecord,
    optimal: u32,
    force: bool,
    messenger: &mut Messenger,
    transport: &mut dyn ServerTransport,
) -> ServerResult<()> {
    if client.reinvade_nonblocking_active {
        return Ok(());
    }

    let current = client.number_of_assigned_cores() as i64;
    let delta = i64::from(optimal) - current;

    if delta == 0 && !force {
        return Ok(());
    }

    let (anything_changed, affinity) = if delta < 0 {
        let reduced = client.reduced_tail((-delta) as usize);
        (true, reduced)
    } else {
        let want = delta.max(0) as usize;
        let claims: Vec<CoreId> = table.free_cores_low_to_high().take(want).collect();
        if claims.is_empty() && !force {
            return Ok(());
        }
        for core in &claims {
            table.assign(*core, client.client_id)?;
        }
        for core in &claims {
            client.add_assigned_core(*core);
        }
        (!claims.is_empty(), client.assigned_cores.clone())
    };

    let msg = messenger.reinvade_nonblocking(client.pid, anything_changed, affinity);
    transport.send_to(client.pid.get(), &msg)?;
    client.reinvade_nonblocking_active = true;
    Ok(())
}

/// Rebuilds a client's ownership from its
/// `CLIENT_REINVADE_ACK_NONBLOCKING` affinity array: clears every slot
/// it previously held, then re-claims exactly the ids the ack names,
/// in the ack's own order.
pub fn apply_reinvade_ack(
    table: &mut ResourceTable,
    client: &mut ClientRecord,
    affinity: Vec<CoreId>,
) -> ServerResult<()> {
    table.release_all_for(client.client_id);
    for core in &affinity {
        table.assign(*core, client.client_id)?;
    }
    client.replace_assigned_cores(affinity);
    client.reinvade_nonblocking_active = false;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreward_transport::InMemoryHub;
    use coreward_types::{ClientId, Pid};

    fn client(min: u32, max: u32) -> ClientRecord {
        let mut c = ClientRecord::new(ClientId(1), Pid(100));
        c.set_constraints(min, max, 0.0, vec![]);
        c
    }

    #[test]
    fn sync_grants_requested_cores_from_the_high_end() {
        let mut table = ResourceTable::new(4);
        let mut client = client(1, 4);
        let outcome = apply_sync(&mut table, &mut client, 2).unwrap();
        assert_eq!(outcome, Outcome::Changed);
        assert_eq!(client.assigned_cores, vec![CoreId(2), CoreId(3)]);
    }

    #[test]
    fn sync_releases_from_the_high_end_on_shrink() {
        let mut table = ResourceTable::new(4);
        let mut client = client(1, 4);
        apply_sync(&mut table, &mut client, 4).unwrap();
        let outcome = apply_sync(&mut table, &mut client, 1).unwrap();
        assert_eq!(outcome, Outcome::Changed);
        assert_eq!(client.assigned_cores, vec![CoreId(0)]);
        assert_eq!(table.owner(CoreId(3)), None);
    }

    #[test]
    fn sync_reports_unchanged_when_nothing_is_free() {
        let mut table = ResourceTable::new(1);
        let mut a = client(1, 4);
        apply_sync(&mut table, &mut a, 1).unwrap();
        let mut b = {
            let mut c = ClientRecord::new(ClientId(2), Pid(200));
            c.set_constraints(1, 4, 0.0, vec![]);
            c
        };
        let outcome = apply_sync(&mut table, &mut b, 1).unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
    }

    #[test]
    fn async_claims_low_to_high_and_sets_the_in_flight_gate() {
        let hub = InMemoryHub::new(8);
        let mut server = hub.server_transport();
        let mut client_transport = hub.register_client(Pid(100));

        let mut table = ResourceTable::new(4);
        let mut client = client(1, 4);
        let mut messenger = Messenger::new();

        apply_async(&mut table, &mut client, 2, false, &mut messenger, &mut server).unwrap();
        assert!(client.reinvade_nonblocking_active);
        assert_eq!(client.assigned_cores, vec![CoreId(0), CoreId(1)]);

        let received = client_transport.recv_blocking().unwrap();
        match received {
            coreward_wire::Message::ServerReinvadeNonblocking(answer) => {
                assert!(answer.anything_changed);
                assert_eq!(answer.affinity, vec![CoreId(0), CoreId(1)]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn async_does_not_touch_ownership_on_shrink_until_ack() {
        let hub = InMemoryHub::new(8);
        let mut server = hub.server_transport();
        let mut client_transport = hub.register_client(Pid(100));

        let mut table = ResourceTable::new(4);
        let mut client = client(1, 4);
        let mut messenger = Messenger::new();
        apply_async(&mut table, &mut client, 4, false, &mut messenger, &mut server).unwrap();
        client.reinvade_nonblocking_active = false;
        let _ = client_transport.recv_blocking().unwrap();

        apply_async(&mut table, &mut client, 1, false, &mut messenger, &mut server).unwrap();
        assert_eq!(client.assigned_cores.len(), 4, "ownership untouched before the ack");
        assert_eq!(table.owner(CoreId(3)), Some(ClientId(1)));

        let proposal = client_transport.recv_blocking().unwrap();
        match proposal {
            coreward_wire::Message::ServerReinvadeNonblocking(answer) => {
                assert_eq!(answer.affinity, vec![CoreId(1), CoreId(2), CoreId(3)]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn second_async_proposal_is_gated_while_one_is_in_flight() {
        let hub = InMemoryHub::new(8);
        let mut server = hub.server_transport();
        let _client_transport = hub.register_client(Pid(100));

        let mut table = ResourceTable::new(4);
        let mut client = client(1, 4);
        let mut messenger = Messenger::new();
        apply_async(&mut table, &mut client, 2, false, &mut messenger, &mut server).unwrap();
        assert!(client.reinvade_nonblocking_active);

        apply_async(&mut table, &mut client, 4, false, &mut messenger, &mut server).unwrap();
        assert_eq!(client.assigned_cores.len(), 2, "gated: no second proposal claimed more cores");
    }

    #[test]
    fn reinvade_ack_rebuilds_ownership_from_the_affinity_array() {
        let mut table = ResourceTable::new(4);
        let mut client = client(1, 4);
        table.assign(CoreId(0), ClientId(1)).unwrap();
        table.assign(CoreId(1), ClientId(1)).unwrap();
        client.assigned_cores = vec![CoreId(0), CoreId(1)];
        client.reinvade_nonblocking_active = true;

        apply_reinvade_ack(&mut table, &mut client, vec![CoreId(1)]).unwrap();
        assert_eq!(client.assigned_cores, vec![CoreId(1)]);
        assert_eq!(table.owner(CoreId(0)), None);
        assert_eq!(table.owner(CoreId(1)), Some(ClientId(1)));
        assert!(!client.reinvade_nonblocking_active);
    }
}
