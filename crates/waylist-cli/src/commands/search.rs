use std::collections::HashSet;

use waylist_core::models::Checklist;
use waylist_core::Session;

use crate::commands::common::{
    format_place_lines, normalize_search_query, place_to_list_item, PlaceListItem,
};
use crate::error::CliError;

pub fn run_search(
    session: &Session,
    list: Checklist,
    query: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let normalized_query = normalize_search_query(query)?;
    let mirror = session.mirror();
    let places = mirror.search_places(list, &normalized_query, limit)?;
    let visited = mirror.visited_ids(list)?.into_iter().collect::<HashSet<_>>();

    if as_json {
        let json_items = places
            .iter()
            .map(|place| place_to_list_item(place, &visited))
            .collect::<Vec<PlaceListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_place_lines(&places, &visited) {
            println!("{line}");
        }
    }

    Ok(())
}
