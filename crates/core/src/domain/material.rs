use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialPriority {
    Low,
    Normal,
    Urgent,
}

impl MaterialPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "urgent" => Self::Urgent,
            _ => Self::Normal,
        }
    }
}

/// Line item referenced by id-list from a purchase request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub category: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    pub priority: MaterialPriority,
    pub created_at: DateTime<Utc>,
}

impl Material {
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_cost
    }
}

/// Cost aggregation is derived, never stored.
pub fn total_cost(materials: &[Material]) -> Decimal {
    materials.iter().map(Material::line_total).sum()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{total_cost, Material, MaterialId, MaterialPriority};

    fn material(id: &str, quantity: i64, unit_cost_minor: i64) -> Material {
        Material {
            id: MaterialId(id.to_string()),
            name: "gypsum board 12mm".to_string(),
            category: "drywall".to_string(),
            quantity: Decimal::new(quantity, 0),
            unit: "sheet".to_string(),
            unit_cost: Decimal::new(unit_cost_minor, 2),
            priority: MaterialPriority::Normal,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn line_total_multiplies_quantity_by_unit_cost() {
        assert_eq!(material("MAT-1", 40, 1_250).line_total(), Decimal::new(50_000, 2));
    }

    #[test]
    fn total_cost_sums_line_totals() {
        let materials = vec![material("MAT-1", 40, 1_250), material("MAT-2", 10, 9_900)];
        assert_eq!(total_cost(&materials), Decimal::new(149_000, 2));
    }

    #[test]
    fn priority_parse_defaults_to_normal() {
        assert_eq!(MaterialPriority::parse("urgent"), MaterialPriority::Urgent);
        assert_eq!(MaterialPriority::parse("unspecified"), MaterialPriority::Normal);
    }
}
