use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use wiring_manifest::{ComponentDeclaration, Ident};

#[derive(Clone, Debug, thiserror::Error)]
#[error("declarations contain a reference cycle: {}", render_cycle(.cycle))]
pub struct CycleError {
    /// Identifiers along the cycle; the first entry is repeated at the end.
    pub cycle: Vec<Ident>,
}

fn render_cycle(cycle: &[Ident]) -> String {
    let names: Vec<&str> = cycle.iter().map(Ident::as_str).collect();
    names.join(" -> ")
}

/// Topologically sort declarations by their references:
/// if B references A, A must come before B.
///
/// Notes:
/// - Ties are broken by declaration position, so an already-ordered document keeps its order.
/// - Self-references are ignored.
/// - References to identifiers that are not declared are ignored; resolution reports them.
/// - A repeated identifier only provides through its first declaration.
pub fn topo_order(decls: &[ComponentDeclaration]) -> Result<Vec<usize>, CycleError> {
    let n = decls.len();
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (i, decl) in decls.iter().enumerate() {
        index_of.entry(decl.id().as_str()).or_insert(i);
    }

    let mut indeg = vec![0usize; n];
    let mut out: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut providers: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (v, decl) in decls.iter().enumerate() {
        for (_, target) in decl.references() {
            let Some(&u) = index_of.get(target.as_str()) else {
                continue;
            };
            if u == v {
                continue;
            }
            out[u].push(v);
            providers[v].push(u);
        }
    }

    for out in &mut out {
        out.sort_unstable();
        out.dedup();
        for &v in out.iter() {
            indeg[v] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indeg
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(u)) = ready.pop() {
        order.push(u);
        for &v in &out[u] {
            indeg[v] -= 1;
            if indeg[v] == 0 {
                ready.push(Reverse(v));
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }

    Err(CycleError {
        cycle: find_cycle(decls, &providers, &indeg),
    })
}

/// Follow providers through the declarations left unsorted until one repeats.
///
/// An unsorted declaration always has an unsorted provider, so the walk closes on a cycle.
/// The cycle is returned provider first.
fn find_cycle(
    decls: &[ComponentDeclaration],
    providers: &[Vec<usize>],
    indeg: &[usize],
) -> Vec<Ident> {
    let mut visited_at: Vec<Option<usize>> = vec![None; decls.len()];
    let mut walk: Vec<usize> = Vec::new();
    let Some(mut at) = indeg.iter().position(|&d| d > 0) else {
        return Vec::new();
    };

    loop {
        if let Some(pos) = visited_at[at] {
            let mut cycle: Vec<Ident> = walk[pos..]
                .iter()
                .map(|&i| decls[i].id().clone())
                .collect();
            cycle.push(decls[at].id().clone());
            cycle.reverse();
            return cycle;
        }
        visited_at[at] = Some(walk.len());
        walk.push(at);

        let Some(&next) = providers[at].iter().find(|&&u| indeg[u] > 0) else {
            return Vec::new();
        };
        at = next;
    }
}
