//! Attribute schema and records: the persisted, delimited-text form of an
//! agent.
//!
//! One [`AttributeSchema`] is built at startup (standard keys, then the
//! configured covariates, then every stage's extra attributes) and shared by
//! every record through an `Arc`. Rows are comma-delimited with a matching
//! header row; text values must not contain the delimiter. Covariates and
//! stage attributes an agent does not carry are written as empty fields.

use std::sync::Arc;

use drifter_logic::constants::{horiz_types, vert_types};
use drifter_logic::error::ConfigError;
use drifter_logic::tracker::GridPosition;
use drifter_logic::transition::LifecycleState;
use serde::{Deserialize, Serialize};

use super::{AgentState, TrackPoint};
use crate::error::{DriftError, Result};

pub const FIELD_DELIMITER: char = ',';
const COORD_DELIMITER: char = ':';
const TRACK_DELIMITER: char = ';';

/// Standard attribute keys.
pub mod keys {
    pub const TYPE_NAME: &str = "typeName";
    pub const ID: &str = "id";
    pub const PARENT_ID: &str = "parentID";
    pub const ORIG_ID: &str = "origID";
    pub const START_TIME: &str = "startTime";
    pub const TIME: &str = "time";
    pub const HORIZ_TYPE: &str = "horizType";
    pub const VERT_TYPE: &str = "vertType";
    pub const HORIZ_POS1: &str = "horizPos1";
    pub const HORIZ_POS2: &str = "horizPos2";
    pub const VERT_POS: &str = "vertPos";
    pub const GRID_CELL_ID: &str = "gridCellID";
    pub const GRID_POS: &str = "gridPos";
    pub const TRACK: &str = "track";
    pub const ACTIVE: &str = "active";
    pub const ALIVE: &str = "alive";
    pub const LIFECYCLE: &str = "lifecycle";
    pub const AGE: &str = "age";
    pub const AGE_IN_STAGE: &str = "ageInStage";
    pub const NUMBER: &str = "number";
    pub const NUM_TRANS: &str = "numTrans";
    pub const ATTACHED: &str = "attached";
    pub const SIZE: &str = "size";
    pub const WEIGHT: &str = "weight";
    pub const TEMPERATURE: &str = "temperature";
    pub const SALINITY: &str = "salinity";
    pub const BATHYMETRY: &str = "bathymetry";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    Text,
    Integer,
    Real,
    Flag,
    /// Grid position `i:j:k`, empty when unset.
    Position,
    /// Track points `lon:lat:depth` joined by `;`.
    Track,
    /// Real that an agent may not carry, empty when absent.
    OptionalReal,
}

use AttributeKind::*;

/// (key, kind, short name) in row order.
const STANDARD: &[(&str, AttributeKind, &str)] = &[
    (keys::TYPE_NAME, Text, "typ"),
    (keys::ID, Integer, "id"),
    (keys::PARENT_ID, Integer, "pid"),
    (keys::ORIG_ID, Integer, "oid"),
    (keys::START_TIME, Real, "t0"),
    (keys::TIME, Real, "t"),
    (keys::HORIZ_TYPE, Integer, "hT"),
    (keys::VERT_TYPE, Integer, "vT"),
    (keys::HORIZ_POS1, Real, "hp1"),
    (keys::HORIZ_POS2, Real, "hp2"),
    (keys::VERT_POS, Real, "vp"),
    (keys::GRID_CELL_ID, Text, "gcid"),
    (keys::GRID_POS, Position, "gpos"),
    (keys::TRACK, Track, "trk"),
    (keys::ACTIVE, Flag, "act"),
    (keys::ALIVE, Flag, "alv"),
    (keys::LIFECYCLE, Text, "lc"),
    (keys::AGE, Real, "age"),
    (keys::AGE_IN_STAGE, Real, "ais"),
    (keys::NUMBER, Real, "num"),
    (keys::NUM_TRANS, Real, "ntr"),
    (keys::ATTACHED, Flag, "att"),
    (keys::SIZE, Real, "len"),
    (keys::WEIGHT, Real, "wgt"),
    (keys::TEMPERATURE, Real, "tmp"),
    (keys::SALINITY, Real, "sal"),
    (keys::BATHYMETRY, Real, "bth"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub key: String,
    pub kind: AttributeKind,
    pub short_name: String,
}

/// Immutable, ordered attribute descriptor list.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSchema {
    descriptors: Vec<AttributeDescriptor>,
    covariates: Vec<String>,
    stage_attributes: Vec<String>,
}

impl AttributeSchema {
    /// Standard keys followed by `covariates`.
    pub fn standard(covariates: &[String]) -> std::result::Result<Arc<Self>, ConfigError> {
        Self::with_stage_attributes(covariates, &[])
    }

    /// Standard keys, then `covariates`, then `stage_attributes`; the last
    /// two as optional reals.
    pub fn with_stage_attributes(
        covariates: &[String],
        stage_attributes: &[String],
    ) -> std::result::Result<Arc<Self>, ConfigError> {
        let mut descriptors: Vec<AttributeDescriptor> = STANDARD
            .iter()
            .map(|(key, kind, short)| AttributeDescriptor {
                key: key.to_string(),
                kind: *kind,
                short_name: short.to_string(),
            })
            .collect();

        let extras = covariates
            .iter()
            .map(|n| ("covariate", n))
            .chain(stage_attributes.iter().map(|n| ("stage attribute", n)));
        for (what, name) in extras {
            if name.is_empty() || name.contains(FIELD_DELIMITER) || name.contains('\n') {
                return Err(ConfigError::invalid(what, name, "not a usable column name"));
            }
            if descriptors
                .iter()
                .any(|d| &d.key == name || &d.short_name == name)
            {
                return Err(ConfigError::invalid(what, name, "collides with another attribute"));
            }
            descriptors.push(AttributeDescriptor {
                key: name.clone(),
                kind: OptionalReal,
                short_name: name.clone(),
            });
        }

        Ok(Arc::new(Self {
            descriptors,
            covariates: covariates.to_vec(),
            stage_attributes: stage_attributes.to_vec(),
        }))
    }

    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn covariates(&self) -> &[String] {
        &self.covariates
    }

    pub fn stage_attributes(&self) -> &[String] {
        &self.stage_attributes
    }

    fn is_covariate(&self, key: &str) -> bool {
        self.covariates.iter().any(|c| c == key)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.key == key)
    }

    /// Header row of attribute keys.
    pub fn header(&self) -> String {
        self.descriptors
            .iter()
            .map(|d| d.key.as_str())
            .collect::<Vec<_>>()
            .join(&FIELD_DELIMITER.to_string())
    }

    /// Accept a header whose columns match the schema order, by key or by
    /// short name.
    pub fn check_header(&self, line: &str) -> Result<()> {
        let columns: Vec<&str> = split_row(line);
        if columns.len() != self.len() {
            return Err(DriftError::malformed(
                "header",
                columns.len().to_string(),
                format!("expected {} columns", self.len()),
                &columns,
            ));
        }
        for (column, d) in columns.iter().zip(&self.descriptors) {
            let column = column.trim();
            if column != d.key && column != d.short_name {
                return Err(DriftError::malformed(
                    d.key.clone(),
                    column,
                    "header column out of order or unknown",
                    &columns,
                ));
            }
        }
        Ok(())
    }
}

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integer(u64),
    Real(f64),
    Flag(bool),
    Position(Option<GridPosition>),
    Track(Vec<TrackPoint>),
    OptionalReal(Option<f64>),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Text(_) => Text,
            AttributeValue::Integer(_) => Integer,
            AttributeValue::Real(_) => Real,
            AttributeValue::Flag(_) => Flag,
            AttributeValue::Position(_) => Position,
            AttributeValue::Track(_) => Track,
            AttributeValue::OptionalReal(_) => OptionalReal,
        }
    }

    pub fn default_for(kind: AttributeKind) -> Self {
        match kind {
            Text => AttributeValue::Text(String::new()),
            Integer => AttributeValue::Integer(0),
            Real => AttributeValue::Real(0.0),
            Flag => AttributeValue::Flag(false),
            Position => AttributeValue::Position(None),
            Track => AttributeValue::Track(Vec::new()),
            OptionalReal => AttributeValue::OptionalReal(None),
        }
    }

    /// Text form used in rows. Reals use the shortest representation that
    /// parses back to the same value.
    pub fn format(&self) -> String {
        match self {
            AttributeValue::Text(s) => s.clone(),
            AttributeValue::Integer(v) => v.to_string(),
            AttributeValue::Real(v) | AttributeValue::OptionalReal(Some(v)) => v.to_string(),
            AttributeValue::OptionalReal(None) => String::new(),
            AttributeValue::Flag(v) => v.to_string(),
            AttributeValue::Position(None) => String::new(),
            AttributeValue::Position(Some(p)) => format!(
                "{}{c}{}{c}{}",
                p.i,
                p.j,
                p.k,
                c = COORD_DELIMITER
            ),
            AttributeValue::Track(points) => points
                .iter()
                .map(|p| format!("{}{c}{}{c}{}", p.lon, p.lat, p.depth, c = COORD_DELIMITER))
                .collect::<Vec<_>>()
                .join(&TRACK_DELIMITER.to_string()),
        }
    }

    /// Parse the text form of a value of `kind`. The error is a reason.
    /// Text is kept exactly; other kinds ignore surrounding whitespace.
    pub fn parse(kind: AttributeKind, text: &str) -> std::result::Result<Self, String> {
        if kind == Text {
            return Ok(AttributeValue::Text(text.to_string()));
        }
        let text = text.trim();
        Ok(match kind {
            Text => AttributeValue::Text(text.to_string()),
            Integer => AttributeValue::Integer(
                text.parse()
                    .map_err(|_| "not a non-negative integer".to_string())?,
            ),
            Real => AttributeValue::Real(parse_real(text)?),
            Flag => AttributeValue::Flag(match text {
                "true" => true,
                "false" => false,
                _ => return Err("expected true or false".into()),
            }),
            Position => {
                if text.is_empty() {
                    AttributeValue::Position(None)
                } else {
                    let [i, j, k] = parse_triple(text)?;
                    AttributeValue::Position(Some(GridPosition::new(i, j, k)))
                }
            }
            Track => {
                if text.is_empty() {
                    AttributeValue::Track(Vec::new())
                } else {
                    let points = text
                        .split(TRACK_DELIMITER)
                        .map(|p| parse_triple(p).map(|[lon, lat, depth]| TrackPoint::new(lon, lat, depth)))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    AttributeValue::Track(points)
                }
            }
            OptionalReal if text.is_empty() => AttributeValue::OptionalReal(None),
            OptionalReal => AttributeValue::OptionalReal(Some(parse_real(text)?)),
        })
    }
}

fn parse_real(text: &str) -> std::result::Result<f64, String> {
    text.parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", text))
}

fn parse_triple(text: &str) -> std::result::Result<[f64; 3], String> {
    let parts: Vec<&str> = text.split(COORD_DELIMITER).collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 coordinates in '{}'", text));
    }
    Ok([
        parse_real(parts[0])?,
        parse_real(parts[1])?,
        parse_real(parts[2])?,
    ])
}

fn split_row(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n']).split(FIELD_DELIMITER).collect()
}

/// Schema-ordered attribute values for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRecord {
    schema: Arc<AttributeSchema>,
    values: Vec<AttributeValue>,
}

impl AttributeRecord {
    pub fn new(schema: Arc<AttributeSchema>) -> Self {
        let values = schema
            .descriptors()
            .iter()
            .map(|d| AttributeValue::default_for(d.kind))
            .collect();
        Self { schema, values }
    }

    pub fn from_agent(schema: Arc<AttributeSchema>, agent: &AgentState) -> Self {
        let mut record = Self::new(schema);
        record.commit(agent);
        record
    }

    pub fn schema(&self) -> &Arc<AttributeSchema> {
        &self.schema
    }

    pub fn get_value(&self, key: &str) -> Option<&AttributeValue> {
        self.schema.index_of(key).map(|i| &self.values[i])
    }

    pub fn set_value(&mut self, key: &str, value: AttributeValue) -> Result<()> {
        let idx = self
            .schema
            .index_of(key)
            .ok_or_else(|| DriftError::UnknownAttribute(key.to_string()))?;
        let expected = self.schema.descriptors()[idx].kind;
        if value.kind() != expected {
            return Err(DriftError::AttributeKind {
                key: key.to_string(),
                expected,
            });
        }
        if let AttributeValue::Text(s) = &value {
            if s.contains(FIELD_DELIMITER) || s.contains('\n') {
                return Err(ConfigError::invalid(key, s, "contains the field delimiter").into());
            }
        }
        self.values[idx] = value;
        Ok(())
    }

    /// Overwrite every attribute with the agent's current values.
    pub fn commit(&mut self, agent: &AgentState) {
        for (slot, d) in self.values.iter_mut().zip(self.schema.descriptors()) {
            *slot = read_field(agent, &d.key);
        }
    }

    /// Rebuild an agent from the record.
    pub fn to_agent(&self) -> Result<AgentState> {
        let mut agent = AgentState::new("", 0);
        for (value, d) in self.values.iter().zip(self.schema.descriptors()) {
            if let Err(reason) = write_field(&mut agent, &self.schema, &d.key, value) {
                let row = self.row_fields();
                let row_refs: Vec<&str> = row.iter().map(String::as_str).collect();
                return Err(DriftError::malformed(d.key.clone(), value.format(), reason, &row_refs));
            }
        }
        Ok(agent)
    }

    fn row_fields(&self) -> Vec<String> {
        self.values.iter().map(AttributeValue::format).collect()
    }

    pub fn to_row(&self) -> String {
        self.row_fields().join(&FIELD_DELIMITER.to_string())
    }

    pub fn from_row(schema: Arc<AttributeSchema>, line: &str) -> Result<Self> {
        let fields = split_row(line);
        if fields.len() != schema.len() {
            return Err(DriftError::malformed(
                "row",
                fields.len().to_string(),
                format!("expected {} fields", schema.len()),
                &fields,
            ));
        }
        let mut values = Vec::with_capacity(fields.len());
        for (raw, d) in fields.iter().zip(schema.descriptors()) {
            match AttributeValue::parse(d.kind, raw) {
                Ok(v) => values.push(v),
                Err(reason) => {
                    return Err(DriftError::malformed(d.key.clone(), *raw, reason, &fields))
                }
            }
        }
        Ok(Self { schema, values })
    }
}

fn read_field(agent: &AgentState, key: &str) -> AttributeValue {
    use AttributeValue as V;
    match key {
        keys::TYPE_NAME => V::Text(agent.type_name.clone()),
        keys::ID => V::Integer(agent.id),
        keys::PARENT_ID => V::Integer(agent.parent_id),
        keys::ORIG_ID => V::Integer(agent.orig_id),
        keys::START_TIME => V::Real(agent.start_time),
        keys::TIME => V::Real(agent.time),
        keys::HORIZ_TYPE => V::Integer(agent.horiz_type as u64),
        keys::VERT_TYPE => V::Integer(agent.vert_type as u64),
        keys::HORIZ_POS1 => V::Real(agent.horiz_pos1),
        keys::HORIZ_POS2 => V::Real(agent.horiz_pos2),
        keys::VERT_POS => V::Real(agent.vert_pos),
        keys::GRID_CELL_ID => V::Text(agent.grid_cell_id.clone()),
        keys::GRID_POS => V::Position(agent.grid_position),
        keys::TRACK => V::Track(agent.track.clone()),
        keys::ACTIVE => V::Flag(agent.active),
        keys::ALIVE => V::Flag(agent.alive),
        keys::LIFECYCLE => V::Text(agent.lifecycle.as_str().to_string()),
        keys::AGE => V::Real(agent.age),
        keys::AGE_IN_STAGE => V::Real(agent.age_in_stage),
        keys::NUMBER => V::Real(agent.number),
        keys::NUM_TRANS => V::Real(agent.num_trans),
        keys::ATTACHED => V::Flag(agent.attached),
        keys::SIZE => V::Real(agent.size),
        keys::WEIGHT => V::Real(agent.weight),
        keys::TEMPERATURE => V::Real(agent.temperature),
        keys::SALINITY => V::Real(agent.salinity),
        keys::BATHYMETRY => V::Real(agent.bathymetry),
        other => V::OptionalReal(
            agent
                .covariates
                .get(other)
                .or_else(|| agent.stage_attributes.get(other))
                .copied(),
        ),
    }
}

fn write_field(
    agent: &mut AgentState,
    schema: &AttributeSchema,
    key: &str,
    value: &AttributeValue,
) -> std::result::Result<(), String> {
    use AttributeValue as V;
    match (key, value) {
        (keys::TYPE_NAME, V::Text(s)) => agent.type_name = s.clone(),
        (keys::ID, V::Integer(v)) => agent.id = *v,
        (keys::PARENT_ID, V::Integer(v)) => agent.parent_id = *v,
        (keys::ORIG_ID, V::Integer(v)) => agent.orig_id = *v,
        (keys::START_TIME, V::Real(v)) => agent.start_time = *v,
        (keys::TIME, V::Real(v)) => agent.time = *v,
        (keys::HORIZ_TYPE, V::Integer(v)) => {
            agent.horiz_type = u8::try_from(*v)
                .ok()
                .filter(|c| horiz_types::is_valid(*c))
                .ok_or("unknown horizontal position type")?
        }
        (keys::VERT_TYPE, V::Integer(v)) => {
            agent.vert_type = u8::try_from(*v)
                .ok()
                .filter(|c| vert_types::is_valid(*c))
                .ok_or("unknown vertical position type")?
        }
        (keys::HORIZ_POS1, V::Real(v)) => agent.horiz_pos1 = *v,
        (keys::HORIZ_POS2, V::Real(v)) => agent.horiz_pos2 = *v,
        (keys::VERT_POS, V::Real(v)) => agent.vert_pos = *v,
        (keys::GRID_CELL_ID, V::Text(s)) => agent.grid_cell_id = s.clone(),
        (keys::GRID_POS, V::Position(p)) => agent.grid_position = *p,
        (keys::TRACK, V::Track(t)) => agent.track = t.clone(),
        (keys::ACTIVE, V::Flag(v)) => agent.active = *v,
        (keys::ALIVE, V::Flag(v)) => agent.alive = *v,
        (keys::LIFECYCLE, V::Text(s)) => {
            agent.lifecycle = LifecycleState::from_name(s).ok_or("unknown lifecycle state")?
        }
        (keys::AGE, V::Real(v)) => agent.age = *v,
        (keys::AGE_IN_STAGE, V::Real(v)) => agent.age_in_stage = *v,
        (keys::NUMBER, V::Real(v)) => agent.number = *v,
        (keys::NUM_TRANS, V::Real(v)) => agent.num_trans = *v,
        (keys::ATTACHED, V::Flag(v)) => agent.attached = *v,
        (keys::SIZE, V::Real(v)) => agent.size = *v,
        (keys::WEIGHT, V::Real(v)) => agent.weight = *v,
        (keys::TEMPERATURE, V::Real(v)) => agent.temperature = *v,
        (keys::SALINITY, V::Real(v)) => agent.salinity = *v,
        (keys::BATHYMETRY, V::Real(v)) => agent.bathymetry = *v,
        (other, V::OptionalReal(v)) if !STANDARD.iter().any(|(k, _, _)| *k == other) => {
            let map = if schema.is_covariate(other) {
                &mut agent.covariates
            } else {
                &mut agent.stage_attributes
            };
            if let Some(v) = v {
                map.insert(other.to_string(), *v);
            }
        }
        _ => return Err(format!("unexpected {:?} value", value.kind())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<AttributeSchema> {
        AttributeSchema::standard(&["chla".to_string()]).unwrap()
    }

    #[test]
    fn test_schema_order() {
        let s = schema();
        assert_eq!(s.len(), STANDARD.len() + 1);
        assert_eq!(s.index_of("typeName"), Some(0));
        assert_eq!(s.index_of("chla"), Some(STANDARD.len()));
        assert!(s.header().starts_with("typeName,id,parentID,origID"));
    }

    #[test]
    fn test_covariate_collision_rejected() {
        assert!(AttributeSchema::standard(&["size".to_string()]).is_err());
        assert!(AttributeSchema::standard(&["a,b".to_string()]).is_err());
    }

    #[test]
    fn test_set_value_checks_kind() {
        let mut r = AttributeRecord::new(schema());
        assert!(r.set_value("size", AttributeValue::Real(3.0)).is_ok());
        assert!(matches!(
            r.set_value("size", AttributeValue::Flag(true)),
            Err(DriftError::AttributeKind { .. })
        ));
        assert!(matches!(
            r.set_value("nope", AttributeValue::Real(1.0)),
            Err(DriftError::UnknownAttribute(_))
        ));
        assert!(r
            .set_value("gridCellID", AttributeValue::Text("1,2".into()))
            .is_err());
        assert_eq!(r.get_value("size"), Some(&AttributeValue::Real(3.0)));
    }

    #[test]
    fn test_header_accepts_short_names() {
        let s = schema();
        let short: Vec<String> = s.descriptors().iter().map(|d| d.short_name.clone()).collect();
        assert!(s.check_header(&short.join(",")).is_ok());
        assert!(s.check_header(&s.header()).is_ok());
        assert!(s.check_header("typeName,id").is_err());
    }

    #[test]
    fn test_value_formats() {
        assert_eq!(AttributeValue::Position(None).format(), "");
        assert_eq!(
            AttributeValue::Position(Some(GridPosition::new(1.5, -2.0, 0.0))).format(),
            "1.5:-2:0"
        );
        assert_eq!(
            AttributeValue::Track(vec![TrackPoint::new(-160.5, 55.0, 10.0), TrackPoint::new(-160.25, 55.0, 12.5)])
                .format(),
            "-160.5:55:10;-160.25:55:12.5"
        );
    }

    #[test]
    fn test_parse_errors_are_reasons() {
        assert!(AttributeValue::parse(Real, "x").is_err());
        assert!(AttributeValue::parse(Integer, "-1").is_err());
        assert!(AttributeValue::parse(Flag, "yes").is_err());
        assert!(AttributeValue::parse(Position, "1:2").is_err());
    }

    #[test]
    fn test_row_round_trip() {
        let mut agent = AgentState::new("Juvenile", 12).at(-165.25, 56.5, 30.0);
        agent.parent_id = 4;
        agent.orig_id = 2;
        agent.number = 0.0;
        agent.size = 17.3;
        agent.grid_position = Some(GridPosition::new(3.2, -0.5, 7.75));
        agent.track = vec![TrackPoint::new(-165.25, 56.5, 30.0)];
        agent.lifecycle = LifecycleState::Dead;
        agent.covariates.insert("chla".into(), 0.1 + 0.2);

        let row = AttributeRecord::from_agent(schema(), &agent).to_row();
        let back = AttributeRecord::from_row(schema(), &row).unwrap().to_agent().unwrap();
        assert_eq!(back, agent);
    }

    #[test]
    fn test_text_kept_verbatim() {
        let mut agent = AgentState::new(" Larva ", 3);
        agent.grid_cell_id = "  4_7".into();
        let row = AttributeRecord::from_agent(schema(), &agent).to_row();
        let back = AttributeRecord::from_row(schema(), &row).unwrap().to_agent().unwrap();
        assert_eq!(back.type_name, " Larva ");
        assert_eq!(back.grid_cell_id, "  4_7");
    }

    #[test]
    fn test_absent_covariate_stays_absent() {
        let agent = AgentState::new("Egg", 5);
        let record = AttributeRecord::from_agent(schema(), &agent);
        assert_eq!(record.get_value("chla"), Some(&AttributeValue::OptionalReal(None)));
        let row = record.to_row();
        assert!(row.ends_with(','));
        let back = AttributeRecord::from_row(schema(), &row).unwrap().to_agent().unwrap();
        assert!(back.covariates.is_empty());
        assert_eq!(back, agent);
    }

    #[test]
    fn test_stage_attributes_round_trip() {
        let schema = AttributeSchema::with_stage_attributes(
            &["chla".to_string()],
            &["maternalAge".to_string(), "oilGlobuleVolume".to_string()],
        )
        .unwrap();
        assert!(schema.header().ends_with("chla,maternalAge,oilGlobuleVolume"));

        let egg = AgentState::new("Egg", 8).with_attribute("maternalAge", 12.5);
        let row = AttributeRecord::from_agent(schema.clone(), &egg).to_row();
        assert!(row.ends_with(",,12.5,"));
        let back = AttributeRecord::from_row(schema.clone(), &row).unwrap().to_agent().unwrap();
        assert_eq!(back.stage_attributes.get("maternalAge"), Some(&12.5));
        assert!(!back.stage_attributes.contains_key("oilGlobuleVolume"));
        assert!(back.covariates.is_empty());
        assert_eq!(back, egg);
    }

    #[test]
    fn test_stage_attribute_collision_rejected() {
        let chla = vec!["chla".to_string()];
        assert!(AttributeSchema::with_stage_attributes(&chla, &chla).is_err());
        assert!(AttributeSchema::with_stage_attributes(&[], &["weight".to_string()]).is_err());
    }

    #[test]
    fn test_malformed_row_names_field() {
        let agent = AgentState::new("Larva", 1);
        let row = AttributeRecord::from_agent(schema(), &agent).to_row();
        let broken = row.replacen("true", "maybe", 1);
        match AttributeRecord::from_row(schema(), &broken) {
            Err(DriftError::MalformedRecord { field, value, row, .. }) => {
                assert_eq!(field, "active");
                assert_eq!(value, "maybe");
                assert_eq!(row.len(), schema().len());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_type_code_rejected_on_rebuild() {
        let mut r = AttributeRecord::from_agent(schema(), &AgentState::new("Larva", 1));
        r.set_value("horizType", AttributeValue::Integer(9)).unwrap();
        match r.to_agent() {
            Err(DriftError::MalformedRecord { field, .. }) => assert_eq!(field, "horizType"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
