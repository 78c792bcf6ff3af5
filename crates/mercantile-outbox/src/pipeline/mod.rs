/*
 *  Copyright 2025-2026 Mercantile Systems
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Transactional command pipeline.
//!
//! The pipeline runs a command handler and the persistence of the events it
//! recorded inside one database transaction. Either the business mutation and
//! all of its outbox records commit together, or nothing does.

pub mod executor;
pub mod unit_of_work;

pub use executor::{Command, CommandExecutor, TransactionalCommand};
pub use unit_of_work::UnitOfWork;
