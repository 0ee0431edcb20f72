use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::db::models::audit::{AuditLogEntry, AuditSeed};
use crate::db::models::inventory::ItemWithCategory;
use crate::db::models::requests::{InsertRequest, Request, RequestStatus};
use crate::db::store::{
    InventoryStore, RequestStore, RequestPatch, StatusGuard, StoreError, UpdateOutcome,
};

/// Postgres-backed store. Conditional updates take a row lock
/// (`SELECT ... FOR UPDATE`) so two writers racing for the same request are
/// serialized and exactly one sees the guard pass.
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        PgRequestStore { pool }
    }
}

/// Macro for partial updates in an UPDATE statement. `Separated::push` already
/// prepends the comma, so the bind that follows must go in unseparated or the
/// statement reads `field = , $n`.
macro_rules! push_if_some {
    ($separated:ident, $patch:ident, $field:ident) => {
        if let Some(value) = &$patch.$field {
            $separated
                .push(concat!(stringify!($field), " = "))
                .push_bind_unseparated(value);
        }
    };
}

/// Builds the partial UPDATE applied by `update_request_if`. `None` fields are
/// left out of the statement entirely; `updated_at` always refreshes.
fn build_request_update<'a>(id: i32, patch: &'a RequestPatch) -> QueryBuilder<'a, Postgres> {
    let mut query_builder = QueryBuilder::new("UPDATE requests SET ");
    let mut separated = query_builder.separated(", ");

    push_if_some!(separated, patch, status);
    push_if_some!(separated, patch, remarks);
    push_if_some!(separated, patch, reviewed_by);
    push_if_some!(separated, patch, verified_by);
    push_if_some!(separated, patch, authorized_by);
    push_if_some!(separated, patch, approved_by);
    push_if_some!(separated, patch, declined_by);
    push_if_some!(separated, patch, procurement_id);

    // Always update updated_at to now()
    separated.push("updated_at = NOW()");
    query_builder.push(" WHERE id = ").push_bind(id);
    query_builder.push(" RETURNING *");
    query_builder
}

async fn insert_audit(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
    old_status: Option<RequestStatus>,
    seed: AuditSeed,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO request_audit_log (request_id, actor_id, action, old_status, new_status, remarks)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(request_id)
    .bind(seed.actor_id)
    .bind(seed.action)
    .bind(old_status)
    .bind(seed.new_status)
    .bind(seed.remarks)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn find_request(&self, id: i32) -> Result<Option<Request>, StoreError> {
        let request = sqlx::query_as::<_, Request>("SELECT * FROM requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    async fn insert_request(&self, new: InsertRequest, audit: AuditSeed) -> Result<Request, StoreError> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, Request>(
            r#"
            INSERT INTO requests (
                project_id,
                request_type,
                category,
                is_restock,
                inventory_item_id,
                description,
                quantity,
                unit,
                estimated_cost,
                urgency,
                date_needed,
                status,
                requested_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(new.project_id)
        .bind(&new.request_type)
        .bind(&new.category)
        .bind(new.is_restock)
        .bind(new.inventory_item_id)
        .bind(&new.description)
        .bind(new.quantity)
        .bind(&new.unit)
        .bind(new.estimated_cost)
        .bind(&new.urgency)
        .bind(new.date_needed)
        .bind(RequestStatus::Draft)
        .bind(new.requested_by)
        .fetch_one(&mut *tx)
        .await?;

        insert_audit(&mut tx, request.id, None, audit).await?;
        tx.commit().await?;

        Ok(request)
    }

    async fn update_request_if(
        &self,
        id: i32,
        guard: StatusGuard,
        patch: RequestPatch,
        audit: AuditSeed,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so the guard and the update see the same state. An
        // early return drops the transaction, which rolls it back.
        let current = sqlx::query_as::<_, Request>("SELECT * FROM requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(current) = current else {
            return Ok(UpdateOutcome::Missing);
        };
        if !guard.allows(&current) {
            return Ok(UpdateOutcome::GuardFailed(current));
        }

        let mut query_builder = build_request_update(id, &patch);
        let updated = query_builder
            .build_query_as::<Request>()
            .fetch_one(&mut *tx)
            .await?;

        insert_audit(&mut tx, id, Some(current.status.clone()), audit).await?;
        tx.commit().await?;

        Ok(UpdateOutcome::Updated(updated))
    }

    async fn list_in_flight(&self) -> Result<Vec<Request>, StoreError> {
        let requests = sqlx::query_as::<_, Request>(
            r#"
            SELECT * FROM requests
            WHERE status IN ('submitted', 'reviewed', 'forwarded', 'verified', 'authorized')
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn list_approved_unlinked(&self, project_id: Option<i32>) -> Result<Vec<Request>, StoreError> {
        let mut query_builder = QueryBuilder::new(
            "SELECT * FROM requests WHERE status = 'approved' AND procurement_id IS NULL",
        );
        if let Some(project_id) = project_id {
            query_builder.push(" AND project_id = ").push_bind(project_id);
        }
        query_builder.push(" ORDER BY created_at");

        let requests = query_builder
            .build_query_as::<Request>()
            .fetch_all(&self.pool)
            .await?;
        Ok(requests)
    }

    async fn audit_trail(&self, request_id: i32) -> Result<Vec<AuditLogEntry>, StoreError> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(
            "SELECT * FROM request_audit_log WHERE request_id = $1 ORDER BY id",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn managed_project_ids(&self, user_id: i32) -> Result<Vec<i32>, StoreError> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT id FROM projects WHERE manager_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl InventoryStore for PgRequestStore {
    async fn find_item_with_category(&self, item_id: i32) -> Result<Option<ItemWithCategory>, StoreError> {
        let item = sqlx::query_as::<_, ItemWithCategory>(
            r#"
            SELECT
                i.id,
                i.name,
                i.category_id,
                i.project_id,
                i.quantity,
                i.available_quantity,
                i.status,
                i.unit,
                i.created_at,
                i.updated_at,
                c.name AS category_name,
                c.is_consumable
            FROM inventory_items i
            JOIN inventory_categories c ON c.id = i.category_id
            WHERE i.id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }
}
