//! Display names handed out to players as they enter a room.

use rand::Rng;
use rand::seq::IndexedRandom;

/// One name per seat at the default capacity.
const NAMES: &[&str] = &["Alice", "Bob", "Charlie", "Diana", "Ethan", "Fiona"];

/// Picks a name not already in `taken`.
///
/// Prefers an unused name from the list; once all are in use a numeric
/// suffix is added ("Bob 2").
pub(crate) fn pick_name<'a>(
    taken: impl IntoIterator<Item = &'a str>,
    rng: &mut impl Rng,
) -> String {
    let taken: Vec<&str> = taken.into_iter().collect();
    let free: Vec<&str> = NAMES
        .iter()
        .copied()
        .filter(|name| !taken.contains(name))
        .collect();
    if let Some(name) = free.choose(rng) {
        return (*name).to_string();
    }

    let base = NAMES.choose(rng).copied().unwrap_or("Player");
    (2..)
        .map(|n| format!("{base} {n}"))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_pick_name_avoids_taken_names() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut taken: Vec<String> = Vec::new();
        for _ in 0..NAMES.len() {
            let name = pick_name(taken.iter().map(String::as_str), &mut rng);
            assert!(!taken.contains(&name));
            taken.push(name);
        }
    }

    #[test]
    fn test_pick_name_suffixes_when_list_exhausted() {
        let mut rng = StdRng::seed_from_u64(2);
        let name = pick_name(NAMES.iter().copied(), &mut rng);
        assert!(name.ends_with(" 2"), "got {name}");
    }

    #[test]
    fn test_list_covers_a_default_room() {
        assert_eq!(NAMES.len(), crate::RoomConfig::default().max_players);
    }
}
