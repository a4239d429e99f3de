use std::collections::HashSet;

use waylist_core::models::Checklist;
use waylist_core::Session;

use crate::commands::common::{format_place_lines, place_to_list_item, PlaceListItem};
use crate::error::CliError;

pub fn run_list(
    session: &Session,
    list: Checklist,
    limit: usize,
    visited_only: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let mirror = session.mirror();
    let visited = mirror.visited_ids(list)?.into_iter().collect::<HashSet<_>>();
    let places = mirror
        .visible_places(list)?
        .into_iter()
        .filter(|place| !place.synthetic)
        .filter(|place| !visited_only || visited.contains(&place.id))
        .take(limit)
        .collect::<Vec<_>>();

    if as_json {
        let json_items = places
            .iter()
            .map(|place| place_to_list_item(place, &visited))
            .collect::<Vec<PlaceListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if places.is_empty() {
        println!(
            "No places yet. Run `waylist refresh places {}` to fetch them.",
            list.key()
        );
    } else {
        for line in format_place_lines(&places, &visited) {
            println!("{line}");
        }
    }

    Ok(())
}
