//! Greedy hill-climbing core-count optimizer.
//!
//! Produces one target core count per client from their scalability
//! graphs, constraints, and distribution hints. Never touches the
//! resource table or any client's `assigned_cores` — the reconcilers
//! own moving reality toward this target.

use crate::client::ClientRecord;

/// Computes `optimal[i]`, one entry per client in `clients` order.
pub fn optimize(clients: &[ClientRecord], max_cores: u32) -> Vec<u32> {
    if clients.is_empty() {
        return Vec::new();
    }

    let mut optimal: Vec<u32> = Vec::with_capacity(clients.len());
    let mut remaining = max_cores;

    for client in clients {
        let want = if client.max_cores == 0 { 0 } else { client.min_cores.max(1) };
        let take = want.min(remaining).min(client.max_cores);
        optimal.push(take);
        remaining -= take;
    }
    let mut used_cores = max_cores - remaining;

    let sum_hint: f64 = clients.iter().map(|c| c.distribution_hint).filter(|h| *h > 0.0).sum();
    let inv = if sum_hint > 0.0 { f64::from(max_cores) / sum_hint } else { 0.0 };

    let mut steps = 0;
    while used_cores < max_cores && steps < max_cores {
        steps += 1;

        let mut best: Option<(usize, f64)> = None;
        for (i, client) in clients.iter().enumerate() {
            if optimal[i] >= client.max_cores {
                continue;
            }
            if sum_hint > 0.0 {
                let hint_cap = (client.distribution_hint * inv + 0.5).floor() as u32;
                if hint_cap < optimal[i] + 1 {
                    continue;
                }
            }

            let current = client.scalability_at(optimal[i], max_cores);
            let bumped = client.scalability_at(optimal[i] + 1, max_cores);
            let delta = bumped - current;

            if delta > 0.0 {
                match best {
                    Some((_, best_delta)) if best_delta >= delta => {}
                    _ => best = Some((i, delta)),
                }
            }
        }

        match best {
            Some((i, _)) => {
                optimal[i] += 1;
                used_cores += 1;
            }
            None => break,
        }
    }

    optimal
}
