use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                username        TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash   TEXT NOT NULL,
                full_name       TEXT,
                role            TEXT NOT NULL DEFAULT 'user'
                                CHECK (role IN ('user', 'moderator', 'admin')),
                is_active       INTEGER NOT NULL DEFAULT 1,
                is_verified     INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT
            );

            -- moderator_id has no ON DELETE action: a decision keeps its moderator.
            CREATE TABLE promotions (
                id                  TEXT PRIMARY KEY,
                title               TEXT NOT NULL,
                description         TEXT,
                link                TEXT NOT NULL,
                original_price      REAL,
                price               REAL NOT NULL,
                category            TEXT NOT NULL DEFAULT 'other',
                store               TEXT NOT NULL,
                owner_id            TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                moderator_id        TEXT REFERENCES users(id),
                status              TEXT NOT NULL DEFAULT 'pending'
                                    CHECK (status IN ('pending', 'approved', 'rejected')),
                rejection_reason    TEXT,
                moderation_notes    TEXT,
                is_active           INTEGER NOT NULL DEFAULT 1,
                is_featured         INTEGER NOT NULL DEFAULT 0,
                views_count         INTEGER NOT NULL DEFAULT 0,
                clicks_count        INTEGER NOT NULL DEFAULT 0,
                expires_at          TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT,
                decided_at          TEXT
            );

            CREATE INDEX idx_promotions_status ON promotions(status, created_at);
            CREATE INDEX idx_promotions_owner ON promotions(owner_id);

            CREATE TABLE coupons (
                id                  TEXT PRIMARY KEY,
                title               TEXT NOT NULL,
                code                TEXT NOT NULL,
                description         TEXT,
                link                TEXT NOT NULL,
                store               TEXT NOT NULL,
                discount_value      TEXT NOT NULL,
                min_purchase        TEXT,
                owner_id            TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                moderator_id        TEXT REFERENCES users(id),
                status              TEXT NOT NULL DEFAULT 'pending'
                                    CHECK (status IN ('pending', 'approved', 'rejected')),
                rejection_reason    TEXT,
                moderation_notes    TEXT,
                is_active           INTEGER NOT NULL DEFAULT 1,
                times_used          INTEGER NOT NULL DEFAULT 0,
                expires_at          TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT,
                decided_at          TEXT
            );

            CREATE INDEX idx_coupons_status ON coupons(status, created_at);
            CREATE INDEX idx_coupons_owner ON coupons(owner_id);
            CREATE INDEX idx_coupons_code ON coupons(code);

            CREATE TABLE comments (
                id              TEXT PRIMARY KEY,
                content         TEXT NOT NULL,
                author_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                promotion_id    TEXT REFERENCES promotions(id) ON DELETE CASCADE,
                coupon_id       TEXT REFERENCES coupons(id) ON DELETE CASCADE,
                parent_id       TEXT REFERENCES comments(id) ON DELETE CASCADE,
                is_active       INTEGER NOT NULL DEFAULT 1,
                is_edited       INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT,
                CHECK ((promotion_id IS NULL) <> (coupon_id IS NULL))
            );

            CREATE INDEX idx_comments_promotion ON comments(promotion_id, created_at);
            CREATE INDEX idx_comments_coupon ON comments(coupon_id, created_at);
            CREATE INDEX idx_comments_author ON comments(author_id);

            -- Exactly one target column is set; one like per (user, target).
            CREATE TABLE likes (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                promotion_id    TEXT REFERENCES promotions(id) ON DELETE CASCADE,
                coupon_id       TEXT REFERENCES coupons(id) ON DELETE CASCADE,
                comment_id      TEXT REFERENCES comments(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL,
                CHECK ((promotion_id IS NOT NULL) + (coupon_id IS NOT NULL) + (comment_id IS NOT NULL) = 1)
            );

            CREATE UNIQUE INDEX uq_likes_promotion ON likes(user_id, promotion_id)
                WHERE promotion_id IS NOT NULL;
            CREATE UNIQUE INDEX uq_likes_coupon ON likes(user_id, coupon_id)
                WHERE coupon_id IS NOT NULL;
            CREATE UNIQUE INDEX uq_likes_comment ON likes(user_id, comment_id)
                WHERE comment_id IS NOT NULL;
            CREATE INDEX idx_likes_promotion ON likes(promotion_id);
            CREATE INDEX idx_likes_coupon ON likes(coupon_id);
            CREATE INDEX idx_likes_comment ON likes(comment_id);

            CREATE TABLE refresh_tokens (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_hash      TEXT NOT NULL UNIQUE,
                created_at      TEXT NOT NULL,
                expires_at      TEXT NOT NULL
            );

            CREATE INDEX idx_refresh_tokens_user ON refresh_tokens(user_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
