pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  created_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS logs (
  id BIGINT PRIMARY KEY,
  project_id TEXT NOT NULL,
  ts TIMESTAMP NOT NULL,
  logger TEXT NOT NULL,
  trace_id TEXT NOT NULL,
  severity TEXT NOT NULL,
  message TEXT NOT NULL,
  duration_ms BIGINT
);

CREATE TABLE IF NOT EXISTS components (
  id BIGINT PRIMARY KEY,
  project_id TEXT NOT NULL,
  name TEXT NOT NULL,
  package_name TEXT NOT NULL,
  layer TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dependency_edges (
  project_id TEXT NOT NULL,
  from_component_id BIGINT NOT NULL,
  to_component_id BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS project_databases (
  project_id TEXT NOT NULL,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS metrics_snapshots (
  id BIGINT PRIMARY KEY,
  project_id TEXT NOT NULL,
  aggregated_at TIMESTAMP NOT NULL,
  total_logs BIGINT NOT NULL,
  error_logs BIGINT NOT NULL,
  warn_logs BIGINT NOT NULL,
  info_logs BIGINT NOT NULL,
  sum_response_time BIGINT NOT NULL,
  response_samples BIGINT NOT NULL,
  avg_response_time DOUBLE NOT NULL
);

CREATE TABLE IF NOT EXISTS component_metrics (
  project_id TEXT NOT NULL,
  component_id BIGINT NOT NULL,
  call_count BIGINT NOT NULL,
  error_count BIGINT NOT NULL,
  PRIMARY KEY(project_id, component_id)
);

CREATE SEQUENCE IF NOT EXISTS logs_id_seq;
CREATE SEQUENCE IF NOT EXISTS components_id_seq;
CREATE SEQUENCE IF NOT EXISTS snapshots_id_seq;

CREATE INDEX IF NOT EXISTS idx_logs_project_trace ON logs(project_id, trace_id);
CREATE INDEX IF NOT EXISTS idx_logs_project_ts ON logs(project_id, ts);

CREATE INDEX IF NOT EXISTS idx_components_lookup ON components(project_id, package_name, name);
CREATE INDEX IF NOT EXISTS idx_edges_project ON dependency_edges(project_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_project_at ON metrics_snapshots(project_id, aggregated_at);
"#;
