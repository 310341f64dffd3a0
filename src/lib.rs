/*!
# Predictables

Backend for the Predictables data-science web application: it serves
tabular datasets as JSON and splits large ones into fixed-size JSON chunks
that a browser can fetch one at a time.

## Overview

A dataset is loaded from a CSV or JSON file into an in-memory table. The
planner picks how many chunks a table of a given size should be cut into,
and the chunk store writes each chunk as a JSON array of row records to its
own file (`iris_001_of_020.json`, ...). Writing is idempotent: if the full
set of chunk files for a dataset and count already exists nothing is
recomputed.

## Architecture

### Core (always built)
- Dataset model - columns plus rows of scalars, loaded from CSV or JSON
- Chunk planner - `max(20, rows / 50_000 + 1)` chunks
- Chunk store - partitioning, serialization and atomic chunk files
- Orient - pandas-compatible JSON layouts of a whole dataset
- Registration rules - ordered validation pipeline for new accounts
- Settings - defaults, config file and `PREDICTABLES_*` environment

### Web layer (feature `web`, on by default)
- axum router over one shared application context
- JSON user store with argon2 password hashes and session tokens
- Concurrent dispatch of chunks to a remote HTTP endpoint

## Modules

- **error**: crate-wide error type
- **config**: runtime settings
- **dataset**: scalar values and tables
- **planner**: chunk count heuristic
- **chunk**: partitioning and the on-disk chunk store
- **loader**: CSV/JSON parsing and the named dataset directory
- **orient**: JSON export layouts
- **validation**: registration rule pipeline
- **login**: accounts, sessions and auth handlers
- **dispatch**: sending chunks over HTTP
- **app**: routing and the application context

## REST API Endpoints

- `GET /api/v1/io/sample-data/{name}[/{orient}]` - Whole dataset as JSON
- `GET /api/v1/io/datasets` - Available dataset names
- `GET /api/v1/io/data/get-chunk-count/{name}` - Planned chunk count
- `POST /api/v1/io/data/chunk-dataset/{name}` - Write chunk files
- `GET /api/v1/io/data/chunk/{name}/{chunk}` - One stored chunk
- `POST /api/v1/io/data/send-chunks/{name}` - Dispatch chunks to a URL
- `POST /api/v1/io/upload` - Store a new dataset
- `POST /api/v1/auth/{register,login,logout,password/change}` - Accounts
*/

pub mod chunk;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod orient;
pub mod planner;
pub mod validation;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod dispatch;
#[cfg(feature = "web")]
pub mod login;

pub use chunk::{ChunkStore, WriteOutcome, chunk_filename, serialize_chunks};
pub use config::Settings;
pub use dataset::{Dataset, Scalar};
pub use error::{Error, Result};
pub use planner::plan_chunk_count;
