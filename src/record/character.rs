use crate::record::{FromRecord, Record, RecordResult};

/// A Star Wars character as stored in the `characters` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub person_id: u32,
    pub birth_year: String,
    pub eye_color: String,
    pub films: String,
    pub gender: String,
    pub hair_color: String,
    pub height: String,
    pub home_world: String,
    pub mass: String,
    pub name: String,
    pub skin_color: String,
    pub species: String,
    pub starships: String,
    pub vehicles: String,
}

impl FromRecord for Character {
    fn from_record(record: &Record) -> RecordResult<Self> {
        let field = |name: &str| record.require(name).map(str::to_string);

        Ok(Self {
            person_id: record.id(),
            birth_year: field("birth_year")?,
            eye_color: field("eye_color")?,
            films: field("films")?,
            gender: field("gender")?,
            hair_color: field("hair_color")?,
            height: field("height")?,
            home_world: field("homeworld")?,
            mass: field("mass")?,
            name: field("name")?,
            skin_color: field("skin_color")?,
            species: field("species")?,
            starships: field("starships")?,
            vehicles: field("vehicles")?,
        })
    }
}
