//! # Repository Module
//!
//! SQL access for the register, one repository per aggregate.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Register facade                                                        │
//! │       │                                                                 │
//! │       │  db.shifts().record_sale(shift_id, version, draft)             │
//! │       ▼                                                                 │
//! │  ShiftRepository  ── the only writer ──────────────────────────────┐   │
//! │  ├── open / close                                                  │   │
//! │  ├── record_sale / record_withdrawal / record_expense              │   │
//! │  │        │                                                        │   │
//! │  │        ├── sale::insert_sale          (sales, sale_items)       │   │
//! │  │        ├── outflow::insert_*          (withdrawals, expenses)   │   │
//! │  │        ├── closure::insert_closure    (turn_closures)           │   │
//! │  │        └── counter::allocate_*        (counters)                │   │
//! │  │                                                                 │   │
//! │  SaleRepository, ClosureRepository, CounterRepository: reads       │   │
//! │                                                                    │   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`shift::ShiftRepository`] - Shift lifecycle and recording
//! - [`sale::SaleRepository`] - Sale lookups
//! - [`closure::ClosureRepository`] - Turn closure history
//! - [`counter::CounterRepository`] - Receipt and withdrawal sequences

pub mod closure;
pub mod counter;
pub(crate) mod outflow;
pub mod sale;
pub mod shift;
