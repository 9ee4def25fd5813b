//! Fixed demo dataset inserted into empty tables on first run.

use harvest_store::SeedRow;
use harvest_types::{EntityKind, NewGuidebook, NewPersonaCard, Steps};

pub const FOOD_WASTE_GUIDEBOOK: &str = "Reducing Food Waste in Food Banks";

/// Kinds that carry demo rows, parents first.
pub const SEEDED_KINDS: [EntityKind; 2] = [EntityKind::Persona, EntityKind::Guidebook];

pub fn demo_rows(kind: EntityKind) -> Vec<SeedRow> {
    match kind {
        EntityKind::Persona => demo_personas(),
        EntityKind::Guidebook => demo_guidebooks(),
        _ => Vec::new(),
    }
}

fn text(s: &str) -> Option<String> {
    Some(s.to_string())
}

pub fn demo_personas() -> Vec<SeedRow> {
    vec![
        SeedRow::new(
            "persona:sarah-johnson",
            NewPersonaCard {
                name: "Sarah Johnson".into(),
                age: Some(35),
                occupation: text("Single Mother"),
                background: text("Works two part-time jobs to support her family"),
                challenges: text("Limited time for meal preparation, tight budget"),
                dietary_preferences: text("Vegetarian"),
                household_size: Some(3),
                location: text("Urban"),
                climate_impact_concerns: text("Interested in reducing food waste"),
            },
        ),
        SeedRow::new(
            "persona:emma-thompson",
            NewPersonaCard {
                name: "Emma Thompson".into(),
                age: Some(42),
                occupation: text("Food Bank Manager"),
                background: text("10 years experience in food bank operations"),
                challenges: text("Balancing nutritional needs with available donations"),
                dietary_preferences: text("No restrictions"),
                household_size: Some(4),
                location: text("Suburban"),
                climate_impact_concerns: text("Focused on sustainable food sourcing"),
            },
        ),
    ]
}

pub fn demo_guidebooks() -> Vec<SeedRow> {
    vec![SeedRow::new(
        "guidebook:reducing-food-waste",
        NewGuidebook {
            title: FOOD_WASTE_GUIDEBOOK.into(),
            description: text(
                "A comprehensive guide to minimizing food waste in food bank operations",
            ),
            steps: Steps::from(vec![
                "Audit current waste levels",
                "Implement inventory tracking",
                "Optimize storage conditions",
                "Establish donation guidelines",
                "Train staff and volunteers",
            ]),
            estimated_time: text("3-6 months"),
            difficulty_level: text("Medium"),
            key_considerations: text("Storage capacity, volunteer training needs"),
            resources_needed: text(
                "Inventory management system, storage containers, training materials",
            ),
        },
    )]
}
