//! Procedural mock-data generator.
//!
//! Each template synthesizes records from fixed value pools with bounded
//! random ranges per field (salaries follow position tiers, stock status
//! follows fill levels). Batches come out in fixed-size chunks with a
//! final partial remainder, so any total row count is reachable. Passing a
//! seed makes the whole dataset reproducible.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use chrono::{Duration, Local};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    data::Cell,
    infer::infer_types,
    source::{RowChunk, RowSource},
};

const FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Michael", "Sarah", "David", "Lisa", "Robert", "Jennifer", "William",
    "Jessica", "James", "Ashley", "Christopher", "Amanda", "Daniel", "Stephanie", "Matthew",
    "Nicole",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Wilson", "Anderson", "Thomas", "Taylor", "Moore",
];

const DEPARTMENTS: &[(&str, &[&str])] = &[
    ("Engineering", &["Senior Engineer", "Engineer", "Junior Engineer", "Team Lead", "Manager"]),
    ("Manufacturing", &["Production Supervisor", "Operator", "Technician", "Manager"]),
    ("Quality Assurance", &["QA Engineer", "QC Inspector", "QA Manager", "Auditor"]),
    ("Sales & Marketing", &["Sales Representative", "Account Manager", "Marketing Specialist", "Sales Director"]),
    ("Human Resources", &["HR Specialist", "Recruiter", "HR Manager", "Director"]),
    ("Finance", &["Accountant", "Financial Analyst", "Controller"]),
    ("IT", &["Developer", "System Administrator", "IT Manager"]),
    ("Supply Chain", &["Logistics Coordinator", "Procurement Specialist", "SCM Manager"]),
];

const SALARY_TIERS: &[(&str, (i64, i64))] = &[
    ("Director", (120_000, 200_000)),
    ("Manager", (80_000, 150_000)),
    ("Senior", (60_000, 100_000)),
    ("Lead", (70_000, 120_000)),
    ("Supervisor", (55_000, 85_000)),
    ("Specialist", (50_000, 80_000)),
    ("Coordinator", (40_000, 65_000)),
    ("Technician", (35_000, 55_000)),
    ("Operator", (25_000, 40_000)),
];

const DEFAULT_SALARY_BAND: (i64, i64) = (30_000, 50_000);

const EMPLOYEE_STATUS: &[&str] = &["Active", "Active", "Active", "On Leave", "Inactive"];

const CITIES: &[&str] = &[
    "Bangkok", "Chiang Mai", "Phuket", "Pattaya", "Khon Kaen", "Udon Thani", "Hat Yai",
    "Rayong", "Chonburi", "Samut Prakan",
];

const PROVINCES: &[&str] = &[
    "Bangkok", "Chiang Mai", "Phuket", "Chonburi", "Rayong", "Ayutthaya", "Khon Kaen",
    "Songkhla", "Nakhon Ratchasima", "Samut Prakan",
];

const PRODUCTS: &[&str] = &[
    "Auto Parts A1", "Engine Component B2", "Brake System C3", "Electrical Module D4",
    "Sensor Unit E5", "Control Unit F6", "Transmission Part G7", "Cooling System H8",
    "Filter Unit I9", "Bearing Set J10",
];

const COMPANIES: &[&str] = &[
    "Toyota Motor Corp", "Honda Motor Co", "Nissan Motor Co", "Mazda Motor Corp",
    "Subaru Corporation", "Mitsubishi Motors", "BMW Group", "Ford Motor Company",
    "Hyundai Motor",
];

const REGIONS: &[&str] = &["North", "South", "East", "West", "Central"];
const PAYMENT_METHODS: &[&str] = &["Credit Card", "Bank Transfer", "Cash", "Check"];
const PAYMENT_STATUS: &[&str] = &["Paid", "Paid", "Paid", "Pending", "Overdue"];
const DELIVERY_STATUS: &[&str] = &["Delivered", "Delivered", "In Transit", "Pending"];
const ORDER_PRIORITIES: &[&str] = &["High", "Medium", "Medium", "Low"];

const CATEGORIES: &[(&str, (f64, f64))] = &[
    ("Engine Parts", (500.0, 5000.0)),
    ("Brake Systems", (200.0, 2000.0)),
    ("Electrical Components", (50.0, 1000.0)),
    ("Transmission Parts", (300.0, 3000.0)),
    ("Cooling Systems", (150.0, 1500.0)),
    ("Filters", (20.0, 200.0)),
    ("Sensors", (100.0, 800.0)),
    ("Bearings", (50.0, 500.0)),
];

const SUPPLIERS: &[&str] = &[
    "DENSO Corporation", "Bosch", "Continental", "Magna International", "ZF Friedrichshafen",
    "Aisin Seiki", "Valeo",
];

const WAREHOUSES: &[&str] = &[
    "Bangkok Main", "Chonburi Plant", "Rayong Facility", "Ayutthaya Center", "Laem Chabang Port",
];

const QUALITY_GRADES: &[&str] = &["A+", "A", "A", "B+", "B"];

const ACCOUNT_TYPES: &[&str] = &["Assets", "Liabilities", "Equity", "Revenue", "Expenses"];
const TRANSACTION_TYPES: &[&str] = &["Payment", "Receipt", "Transfer", "Adjustment", "Reversal"];
const APPROVAL_STATUS: &[&str] = &["Approved", "Approved", "Pending", "Rejected"];
const COST_PURPOSES: &[&str] = &["Operations", "Maintenance", "Investment", "Sales", "Purchase"];
const TAX_CODES: &[&str] = &["VAT7", "WHT3", "EXEMPT", "ZERO"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockTemplate {
    Employees,
    Sales,
    Inventory,
    Financial,
    Custom,
}

impl MockTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            MockTemplate::Employees => "employees",
            MockTemplate::Sales => "sales",
            MockTemplate::Inventory => "inventory",
            MockTemplate::Financial => "financial",
            MockTemplate::Custom => "custom",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["employees", "sales", "inventory", "financial", "custom"]
    }

    pub fn columns(&self) -> Vec<String> {
        let names: &[&str] = match self {
            MockTemplate::Employees => &[
                "employee_id", "first_name", "last_name", "email", "department", "position",
                "salary", "hire_date", "status", "phone", "age", "city", "province",
                "performance_rating", "years_of_experience", "active", "created_at",
            ],
            MockTemplate::Sales => &[
                "transaction_id", "customer_name", "customer_code", "product_name",
                "product_code", "quantity", "unit_price", "total_amount", "currency",
                "transaction_date", "sales_rep", "region", "payment_method", "payment_status",
                "discount_percent", "tax_amount", "delivery_status", "order_priority",
                "created_at",
            ],
            MockTemplate::Inventory => &[
                "product_id", "product_name", "sku", "category", "supplier", "warehouse",
                "current_stock", "max_stock", "reorder_point", "unit_price", "total_value",
                "status", "last_updated", "batch_number", "quality_grade", "location_rack",
                "weight_kg", "created_at",
            ],
            MockTemplate::Financial => &[
                "transaction_id", "account_number", "account_name", "account_type",
                "transaction_type", "amount", "currency", "transaction_date", "description",
                "reference_number", "counterparty", "approval_status", "approved_by",
                "cost_center", "project_code", "fiscal_year", "quarter", "tax_code",
                "created_at",
            ],
            MockTemplate::Custom => &[
                "code", "label", "quantity", "ratio", "active", "recorded_at",
            ],
        };
        names.iter().map(|n| n.to_string()).collect()
    }
}

impl std::str::FromStr for MockTemplate {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employees" => Ok(MockTemplate::Employees),
            "sales" => Ok(MockTemplate::Sales),
            "inventory" => Ok(MockTemplate::Inventory),
            "financial" => Ok(MockTemplate::Financial),
            "custom" => Ok(MockTemplate::Custom),
            other => Err(anyhow!(
                "Unknown mock template '{other}'. Available: {}",
                MockTemplate::variants().join(", ")
            )),
        }
    }
}

/// Synthesizes `total_rows` records of the chosen template in
/// `ceil(total/chunk_size)` batches.
#[derive(Debug, Clone)]
pub struct MockSource {
    template: MockTemplate,
    total_rows: usize,
    seed: Option<u64>,
}

impl MockSource {
    pub fn new(template: MockTemplate, total_rows: usize) -> Self {
        Self {
            template,
            total_rows,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl RowSource for MockSource {
    fn describe(&self) -> String {
        format!("mock '{}' ({} rows)", self.template.as_str(), self.total_rows)
    }

    fn total_rows(&self) -> Result<usize> {
        Ok(self.total_rows)
    }

    fn chunks(&self, chunk_size: usize) -> Result<Box<dyn Iterator<Item = Result<RowChunk>>>> {
        if chunk_size == 0 {
            return Err(anyhow!("Chunk size must be positive"));
        }
        let template = self.template;
        let columns = template.columns();
        let mut rng = self.rng();
        let mut remaining = self.total_rows;
        let mut offset = 0usize;
        let mut number = 0usize;

        Ok(Box::new(std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let take = chunk_size.min(remaining);
            let rows: Vec<Vec<Cell>> = (0..take)
                .map(|i| synthesize(template, offset + i, &mut rng))
                .collect();
            remaining -= take;
            offset += take;
            number += 1;
            let type_mapping = (number == 1).then(|| infer_types(&columns, &rows));
            Some(Ok(RowChunk {
                number,
                columns: columns.clone(),
                rows,
                type_mapping,
            }))
        })))
    }
}

fn pick<'a>(rng: &mut StdRng, pool: &'a [&'a str]) -> &'a str {
    pool[rng.gen_range(0..pool.len())]
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn date_within_days(rng: &mut StdRng, days_back: i64) -> String {
    let date = Local::now().date_naive() - Duration::days(rng.gen_range(0..days_back));
    date.format("%Y-%m-%d").to_string()
}

fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn phone_number(rng: &mut StdRng) -> String {
    let prefix = ["06", "08", "09"][rng.gen_range(0..3)];
    let number = format!("{prefix}{}", rng.gen_range(1_000_000..10_000_000));
    format!("{}-{}-{}", &number[..3], &number[3..6], &number[6..])
}

fn salary_for(position: &str, rng: &mut StdRng) -> i64 {
    let (low, high) = SALARY_TIERS
        .iter()
        .find(|(keyword, _)| position.contains(keyword))
        .map(|(_, band)| *band)
        .unwrap_or(DEFAULT_SALARY_BAND);
    rng.gen_range(low..=high)
}

fn synthesize(template: MockTemplate, index: usize, rng: &mut StdRng) -> Vec<Cell> {
    match template {
        MockTemplate::Employees => {
            let first = pick(rng, FIRST_NAMES);
            let last = pick(rng, LAST_NAMES);
            let (department, positions) = &DEPARTMENTS[rng.gen_range(0..DEPARTMENTS.len())];
            let position = pick(rng, positions);
            vec![
                Cell::Text(format!("EMP{:05}", index + 1)),
                Cell::Text(first.to_string()),
                Cell::Text(last.to_string()),
                Cell::Text(format!(
                    "{}.{}@example.com",
                    first.to_ascii_lowercase(),
                    last.to_ascii_lowercase()
                )),
                Cell::Text(department.to_string()),
                Cell::Text(position.to_string()),
                Cell::Integer(salary_for(position, rng)),
                Cell::Text(date_within_days(rng, 3650)),
                Cell::Text(pick(rng, EMPLOYEE_STATUS).to_string()),
                Cell::Text(phone_number(rng)),
                Cell::Integer(rng.gen_range(22..=65)),
                Cell::Text(pick(rng, CITIES).to_string()),
                Cell::Text(pick(rng, PROVINCES).to_string()),
                Cell::Float((rng.gen_range(25..=50) as f64) / 10.0),
                Cell::Integer(rng.gen_range(0..=30)),
                Cell::Boolean(rng.gen_bool(0.85)),
                Cell::Text(timestamp_now()),
            ]
        }
        MockTemplate::Sales => {
            let quantity = rng.gen_range(1..=1000i64);
            let unit_price = round2(rng.gen_range(10.0..5000.0));
            let total = round2(quantity as f64 * unit_price);
            vec![
                Cell::Text(format!("TXN{:07}", index + 1)),
                Cell::Text(pick(rng, COMPANIES).to_string()),
                Cell::Text(format!("CUST{}", rng.gen_range(1000..10000))),
                Cell::Text(pick(rng, PRODUCTS).to_string()),
                Cell::Text(format!("PROD{}", rng.gen_range(100..1000))),
                Cell::Integer(quantity),
                Cell::Float(unit_price),
                Cell::Float(total),
                Cell::Text("THB".to_string()),
                Cell::Text(date_within_days(rng, 730)),
                Cell::Text(format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))),
                Cell::Text(pick(rng, REGIONS).to_string()),
                Cell::Text(pick(rng, PAYMENT_METHODS).to_string()),
                Cell::Text(pick(rng, PAYMENT_STATUS).to_string()),
                Cell::Float((rng.gen_range(0..=150) as f64) / 10.0),
                Cell::Float(round2(total * 0.07)),
                Cell::Text(pick(rng, DELIVERY_STATUS).to_string()),
                Cell::Text(pick(rng, ORDER_PRIORITIES).to_string()),
                Cell::Text(timestamp_now()),
            ]
        }
        MockTemplate::Inventory => {
            let (category, price_band) = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
            let max_stock = rng.gen_range(100..=10_000i64);
            let current_stock = rng.gen_range(0..=max_stock);
            let reorder_point = max_stock / 5;
            let unit_price = round2(rng.gen_range(price_band.0..price_band.1));
            let status = if current_stock == 0 {
                "Out of Stock"
            } else if current_stock <= reorder_point {
                "Low Stock"
            } else if current_stock as f64 >= max_stock as f64 * 0.8 {
                "Overstocked"
            } else {
                "In Stock"
            };
            vec![
                Cell::Text(format!("INV{:06}", index + 1)),
                Cell::Text(format!("{category} - Model {}", rng.gen_range(100..1000))),
                Cell::Text(format!("SKU{}", rng.gen_range(100_000..1_000_000))),
                Cell::Text(category.to_string()),
                Cell::Text(pick(rng, SUPPLIERS).to_string()),
                Cell::Text(pick(rng, WAREHOUSES).to_string()),
                Cell::Integer(current_stock),
                Cell::Integer(max_stock),
                Cell::Integer(reorder_point),
                Cell::Float(unit_price),
                Cell::Float(round2(current_stock as f64 * unit_price)),
                Cell::Text(status.to_string()),
                Cell::Text(date_within_days(rng, 30)),
                Cell::Text(format!("BATCH{}", rng.gen_range(1000..10000))),
                Cell::Text(pick(rng, QUALITY_GRADES).to_string()),
                Cell::Text(format!(
                    "R{:02}-S{:02}",
                    rng.gen_range(1..=50),
                    rng.gen_range(1..=10)
                )),
                Cell::Float(round2(rng.gen_range(0.1..50.0))),
                Cell::Text(timestamp_now()),
            ]
        }
        MockTemplate::Financial => {
            let account_type = pick(rng, ACCOUNT_TYPES);
            let amount = match account_type {
                "Revenue" | "Assets" => rng.gen_range(1_000.0..1_000_000.0),
                "Expenses" => rng.gen_range(500.0..500_000.0),
                _ => rng.gen_range(100.0..100_000.0),
            };
            let month = rng.gen_range(1..=12u32);
            vec![
                Cell::Text(format!("FIN{:07}", index + 1)),
                Cell::Text(format!(
                    "{}-{}",
                    rng.gen_range(1000..10000),
                    rng.gen_range(100..1000)
                )),
                Cell::Text(format!("{account_type} Account {}", rng.gen_range(1..=100))),
                Cell::Text(account_type.to_string()),
                Cell::Text(pick(rng, TRANSACTION_TYPES).to_string()),
                Cell::Float(round2(amount)),
                Cell::Text("THB".to_string()),
                Cell::Text(date_within_days(rng, 365)),
                Cell::Text(format!(
                    "Transaction for {} - {}",
                    account_type.to_ascii_lowercase(),
                    pick(rng, COST_PURPOSES)
                )),
                Cell::Text(format!("REF{}", rng.gen_range(100_000..1_000_000))),
                Cell::Text(pick(rng, COMPANIES).to_string()),
                Cell::Text(pick(rng, APPROVAL_STATUS).to_string()),
                Cell::Text(format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))),
                Cell::Text(format!("CC{}", rng.gen_range(1000..10000))),
                Cell::Text(format!("PROJ{}", rng.gen_range(100..1000))),
                Cell::Integer(rng.gen_range(2022..=2025)),
                Cell::Text(format!("Q{}", (month - 1) / 3 + 1)),
                Cell::Text(pick(rng, TAX_CODES).to_string()),
                Cell::Text(timestamp_now()),
            ]
        }
        MockTemplate::Custom => vec![
            Cell::Text(format!("ROW{:06}", index + 1)),
            Cell::Text(format!("Item {}", rng.gen_range(1..=500))),
            Cell::Integer(rng.gen_range(0..=1000)),
            Cell::Float(round2(rng.gen_range(0.0..1.0))),
            Cell::Boolean(rng.gen_bool(0.5)),
            Cell::Text(timestamp_now()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SemanticType;

    fn collect(template: MockTemplate, total: usize, chunk_size: usize) -> Vec<RowChunk> {
        MockSource::new(template, total)
            .with_seed(Some(7))
            .chunks(chunk_size)
            .expect("chunks")
            .map(|c| c.expect("chunk"))
            .collect()
    }

    #[test]
    fn chunk_counts_cover_the_partial_remainder() {
        let chunks = collect(MockTemplate::Employees, 2500, 1000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(RowChunk::row_count).collect::<Vec<_>>(),
            vec![1000, 1000, 500]
        );
        assert_eq!(
            chunks.iter().map(|c| c.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn type_mapping_only_on_first_chunk() {
        let chunks = collect(MockTemplate::Sales, 50, 20);
        assert!(chunks[0].type_mapping.is_some());
        assert!(chunks.iter().skip(1).all(|c| c.type_mapping.is_none()));
    }

    #[test]
    fn employee_fields_infer_expected_types() {
        let chunks = collect(MockTemplate::Employees, 200, 200);
        let mapping = chunks[0].type_mapping.as_ref().expect("mapping");
        assert_eq!(mapping["salary"], SemanticType::Integer);
        assert_eq!(mapping["performance_rating"], SemanticType::Float);
        assert_eq!(mapping["active"], SemanticType::Boolean);
        assert_eq!(mapping["hire_date"], SemanticType::DateTime);
        assert_eq!(mapping["first_name"], SemanticType::String);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let a = collect(MockTemplate::Inventory, 30, 10);
        let b = collect(MockTemplate::Inventory, 30, 10);
        assert_eq!(a[0].rows, b[0].rows);
        assert_eq!(a[2].rows, b[2].rows);
    }

    #[test]
    fn record_ids_continue_across_chunks() {
        let chunks = collect(MockTemplate::Financial, 25, 10);
        assert_eq!(chunks[2].rows[4][0], Cell::Text("FIN0000025".to_string()));
    }

    #[test]
    fn template_parsing_rejects_unknown_ids() {
        assert!("employees".parse::<MockTemplate>().is_ok());
        assert!("EMPLOYEES".parse::<MockTemplate>().is_ok());
        assert!("customers".parse::<MockTemplate>().is_err());
    }
}
