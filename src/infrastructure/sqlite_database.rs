use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{FriendStorage, LikeStorage, ReferenceStorage, Storage};
use crate::models::reference::{default_genres, default_mpa};
use crate::models::{EntityId, Film, Genre, Mpa, User};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS mpa (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS genres (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        login TEXT NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        birthday TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS films (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        release_date TEXT NOT NULL,
        duration INTEGER NOT NULL,
        mpa_id INTEGER REFERENCES mpa(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS film_genres (
        film_id INTEGER NOT NULL REFERENCES films(id) ON DELETE CASCADE,
        genre_id INTEGER NOT NULL REFERENCES genres(id),
        PRIMARY KEY (film_id, genre_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS friends (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        friend_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, friend_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS likes (
        film_id INTEGER NOT NULL REFERENCES films(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (film_id, user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_friends_friend ON friends(friend_id)",
    "CREATE INDEX IF NOT EXISTS idx_likes_user ON likes(user_id)",
];

const FILM_COLUMNS: &str = "SELECT f.id, f.name, f.description, f.release_date, f.duration, \
     f.mpa_id, m.name AS mpa_name FROM films AS f LEFT JOIN mpa AS m ON m.id = f.mpa_id";

fn db_error(context: impl std::fmt::Display) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(format!("{}: {}", context, e))
}

/// SQLite backend. Cascades are left to foreign keys.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(db_error(format!("Invalid database URL {}", config.url)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new();
        if config.url.contains(":memory:") {
            // every connection to an in-memory URL opens a separate database,
            // and closing the last one drops it
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            pool_options = pool_options.max_connections(config.max_connections.max(1));
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(db_error(format!("Failed to connect to {}", config.url)))?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    /// Creates the tables if needed and seeds the reference tables
    pub async fn initialize(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to create schema"))?;
        }

        for genre in default_genres() {
            sqlx::query("INSERT OR IGNORE INTO genres (id, name) VALUES (?, ?)")
                .bind(genre.id)
                .bind(&genre.name)
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to seed genres"))?;
        }

        for mpa in default_mpa() {
            sqlx::query("INSERT OR IGNORE INTO mpa (id, name) VALUES (?, ?)")
                .bind(mpa.id)
                .bind(&mpa.name)
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to seed mpa"))?;
        }

        Ok(())
    }

    async fn row_exists(&self, sql: &str, id: EntityId) -> AppResult<bool> {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error(format!("Failed to check existence of {}", id)))?;
        Ok(row.is_some())
    }

    async fn film_genres(&self, film_id: EntityId) -> AppResult<Vec<Genre>> {
        let rows = sqlx::query(
            "SELECT g.id, g.name FROM film_genres AS fg \
             JOIN genres AS g ON g.id = fg.genre_id \
             WHERE fg.film_id = ? ORDER BY g.id",
        )
        .bind(film_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(format!("Failed to get genres of film {}", film_id)))?;

        Ok(rows.iter().map(|row| Genre::new(row.get("id"), row.get::<String, _>("name"))).collect())
    }

    async fn reset_sequence(&self, table: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sqlite_sequence WHERE name = ?")
            .bind(table)
            .execute(&self.pool)
            .await
            .map_err(db_error(format!("Failed to reset id sequence of {}", table)))?;
        Ok(())
    }
}

/// Rewrites every friend edge touching `user_id`: outgoing edges to each key
/// of `links`, incoming edges only from the friends flagged `true`
async fn write_friends(
    conn: &mut SqliteConnection,
    user_id: EntityId,
    links: &BTreeMap<EntityId, bool>,
) -> AppResult<()> {
    sqlx::query("DELETE FROM friends WHERE user_id = ? OR friend_id = ?")
        .bind(user_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error(format!("Failed to clear friends of user {}", user_id)))?;

    for (&friend_id, &acknowledged) in links {
        sqlx::query("INSERT OR IGNORE INTO friends (user_id, friend_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(friend_id)
            .execute(&mut *conn)
            .await
            .map_err(db_error(format!("Failed to add friend {} to user {}", friend_id, user_id)))?;

        if acknowledged {
            sqlx::query("INSERT OR IGNORE INTO friends (user_id, friend_id) VALUES (?, ?)")
                .bind(friend_id)
                .bind(user_id)
                .execute(&mut *conn)
                .await
                .map_err(db_error(format!("Failed to add friend {} to user {}", user_id, friend_id)))?;
        }
    }
    Ok(())
}

async fn write_likes(
    conn: &mut SqliteConnection,
    film_id: EntityId,
    user_ids: &BTreeSet<EntityId>,
) -> AppResult<()> {
    sqlx::query("DELETE FROM likes WHERE film_id = ?")
        .bind(film_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error(format!("Failed to clear likes of film {}", film_id)))?;

    for user_id in user_ids {
        sqlx::query("INSERT INTO likes (film_id, user_id) VALUES (?, ?)")
            .bind(film_id)
            .bind(*user_id)
            .execute(&mut *conn)
            .await
            .map_err(db_error(format!("Failed to add like of user {} to film {}", user_id, film_id)))?;
    }
    Ok(())
}

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        login: row.get("login"),
        name: Some(row.get("name")),
        email: row.get("email"),
        birthday: row.get::<NaiveDate, _>("birthday"),
        friends: BTreeMap::new(),
    }
}

fn film_from_row(row: &SqliteRow) -> Film {
    let mpa_id: Option<EntityId> = row.get("mpa_id");
    Film {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        release_date: row.get::<NaiveDate, _>("release_date"),
        duration: row.get("duration"),
        genres: Vec::new(),
        mpa: mpa_id.map(|id| Mpa::new(id, row.get::<Option<String>, _>("mpa_name").unwrap_or_default())),
        likes: BTreeSet::new(),
    }
}

#[async_trait]
impl Storage<User> for SqliteDatabase {
    async fn get(&self, id: EntityId) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT id, login, name, email, birthday FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error(format!("Failed to get user {}", id)))?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_all(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query("SELECT id, login, name, email, birthday FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to get users"))?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn contains(&self, id: EntityId) -> AppResult<bool> {
        self.row_exists("SELECT 1 FROM users WHERE id = ?", id).await
    }

    async fn create(&self, mut user: User) -> AppResult<Option<User>> {
        if Storage::<User>::contains(self, user.id).await? {
            return Ok(None);
        }
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin transaction"))?;

        let result = sqlx::query("INSERT INTO users (login, name, email, birthday) VALUES (?, ?, ?, ?)")
            .bind(&user.login)
            .bind(user.display_name())
            .bind(&user.email)
            .bind(user.birthday)
            .execute(&mut *tx)
            .await
            .map_err(db_error(format!("Failed to create user {}", user.login)))?;
        user.id = result.last_insert_rowid();
        write_friends(&mut tx, user.id, &user.friends).await?;

        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;
        user.friends.clear();
        Ok(Some(user))
    }

    async fn update(&self, mut user: User) -> AppResult<Option<User>> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin transaction"))?;

        let result = sqlx::query("UPDATE users SET login = ?, name = ?, email = ?, birthday = ? WHERE id = ?")
            .bind(&user.login)
            .bind(user.display_name())
            .bind(&user.email)
            .bind(user.birthday)
            .bind(user.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(format!("Failed to update user {}", user.id)))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(db_error("Failed to rollback transaction"))?;
            return Ok(None);
        }
        write_friends(&mut tx, user.id, &user.friends).await?;

        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;
        user.friends.clear();
        Ok(Some(user))
    }

    async fn delete(&self, id: EntityId) -> AppResult<Option<User>> {
        let Some(user) = Storage::<User>::get(self, id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error(format!("Failed to delete user {}", id)))?;
        Ok(Some(user))
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete users"))?;
        self.reset_sequence("users").await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Storage<Film> for SqliteDatabase {
    async fn get(&self, id: EntityId) -> AppResult<Option<Film>> {
        let row = sqlx::query(&format!("{} WHERE f.id = ?", FILM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error(format!("Failed to get film {}", id)))?;

        match row {
            Some(row) => {
                let mut film = film_from_row(&row);
                film.genres = self.film_genres(id).await?;
                Ok(Some(film))
            }
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> AppResult<Vec<Film>> {
        let rows = sqlx::query(&format!("{} ORDER BY f.id", FILM_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to get films"))?;

        let genre_rows = sqlx::query(
            "SELECT fg.film_id, g.id, g.name FROM film_genres AS fg \
             JOIN genres AS g ON g.id = fg.genre_id ORDER BY fg.film_id, g.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to get film genres"))?;

        let mut genres: BTreeMap<EntityId, Vec<Genre>> = BTreeMap::new();
        for row in &genre_rows {
            genres
                .entry(row.get("film_id"))
                .or_default()
                .push(Genre::new(row.get("id"), row.get::<String, _>("name")));
        }

        Ok(rows
            .iter()
            .map(|row| {
                let mut film = film_from_row(row);
                film.genres = genres.remove(&film.id).unwrap_or_default();
                film
            })
            .collect())
    }

    async fn contains(&self, id: EntityId) -> AppResult<bool> {
        self.row_exists("SELECT 1 FROM films WHERE id = ?", id).await
    }

    async fn create(&self, film: Film) -> AppResult<Option<Film>> {
        if Storage::<Film>::contains(self, film.id).await? {
            return Ok(None);
        }
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin transaction"))?;

        let result = sqlx::query(
            "INSERT INTO films (name, description, release_date, duration, mpa_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.duration)
        .bind(film.mpa.as_ref().map(|m| m.id))
        .execute(&mut *tx)
        .await
        .map_err(db_error(format!("Failed to create film {}", film.name)))?;
        let id = result.last_insert_rowid();

        for genre in &film.genres {
            sqlx::query("INSERT OR IGNORE INTO film_genres (film_id, genre_id) VALUES (?, ?)")
                .bind(id)
                .bind(genre.id)
                .execute(&mut *tx)
                .await
                .map_err(db_error(format!("Failed to link genre {} to film {}", genre.id, id)))?;
        }
        write_likes(&mut tx, id, &film.likes).await?;

        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;
        Storage::<Film>::get(self, id).await
    }

    async fn update(&self, film: Film) -> AppResult<Option<Film>> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin transaction"))?;

        let result = sqlx::query(
            "UPDATE films SET name = ?, description = ?, release_date = ?, duration = ?, mpa_id = ? WHERE id = ?",
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.duration)
        .bind(film.mpa.as_ref().map(|m| m.id))
        .bind(film.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error(format!("Failed to update film {}", film.id)))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(db_error("Failed to rollback transaction"))?;
            return Ok(None);
        }

        sqlx::query("DELETE FROM film_genres WHERE film_id = ?")
            .bind(film.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(format!("Failed to clear genres of film {}", film.id)))?;

        for genre in &film.genres {
            sqlx::query("INSERT OR IGNORE INTO film_genres (film_id, genre_id) VALUES (?, ?)")
                .bind(film.id)
                .bind(genre.id)
                .execute(&mut *tx)
                .await
                .map_err(db_error(format!("Failed to link genre {} to film {}", genre.id, film.id)))?;
        }
        write_likes(&mut tx, film.id, &film.likes).await?;

        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;
        Storage::<Film>::get(self, film.id).await
    }

    async fn delete(&self, id: EntityId) -> AppResult<Option<Film>> {
        let Some(film) = Storage::<Film>::get(self, id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM films WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error(format!("Failed to delete film {}", id)))?;
        Ok(Some(film))
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM films")
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete films"))?;
        self.reset_sequence("films").await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FriendStorage for SqliteDatabase {
    async fn add_friend(&self, user_id: EntityId, friend_id: EntityId) -> AppResult<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO friends (user_id, friend_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(friend_id)
            .execute(&self.pool)
            .await
            .map_err(db_error(format!("Failed to add friend {} to user {}", friend_id, user_id)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_friend(&self, user_id: EntityId, friend_id: EntityId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM friends WHERE user_id = ? AND friend_id = ?")
            .bind(user_id)
            .bind(friend_id)
            .execute(&self.pool)
            .await
            .map_err(db_error(format!("Failed to delete friend {} of user {}", friend_id, user_id)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn friend_links(&self, user_id: EntityId) -> AppResult<BTreeMap<EntityId, bool>> {
        let rows = sqlx::query(
            "SELECT f.friend_id, \
             EXISTS (SELECT 1 FROM friends AS r WHERE r.user_id = f.friend_id AND r.friend_id = f.user_id) AS acknowledged \
             FROM friends AS f WHERE f.user_id = ? ORDER BY f.friend_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(format!("Failed to get friends of user {}", user_id)))?;

        Ok(rows
            .iter()
            .map(|row| (row.get("friend_id"), row.get::<i64, _>("acknowledged") != 0))
            .collect())
    }

    async fn common_friend_ids(&self, id1: EntityId, id2: EntityId) -> AppResult<Vec<EntityId>> {
        let rows = sqlx::query(
            "SELECT f1.friend_id FROM friends AS f1 \
             JOIN friends AS f2 ON f2.friend_id = f1.friend_id \
             WHERE f1.user_id = ? AND f2.user_id = ? AND f1.friend_id NOT IN (?, ?) \
             ORDER BY f1.friend_id",
        )
        .bind(id1)
        .bind(id2)
        .bind(id1)
        .bind(id2)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(format!("Failed to get common friends of {} and {}", id1, id2)))?;

        Ok(rows.iter().map(|row| row.get("friend_id")).collect())
    }

}

#[async_trait]
impl LikeStorage for SqliteDatabase {
    async fn add_like(&self, film_id: EntityId, user_id: EntityId) -> AppResult<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO likes (film_id, user_id) VALUES (?, ?)")
            .bind(film_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error(format!("Failed to add like of user {} to film {}", user_id, film_id)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_like(&self, film_id: EntityId, user_id: EntityId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE film_id = ? AND user_id = ?")
            .bind(film_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error(format!("Failed to delete like of user {} from film {}", user_id, film_id)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn like_ids(&self, film_id: EntityId) -> AppResult<BTreeSet<EntityId>> {
        let rows = sqlx::query("SELECT user_id FROM likes WHERE film_id = ?")
            .bind(film_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error(format!("Failed to get likes of film {}", film_id)))?;
        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    async fn top_film_ids(&self, count: usize) -> AppResult<Vec<EntityId>> {
        let rows = sqlx::query(
            "SELECT f.id FROM films AS f LEFT JOIN likes AS l ON l.film_id = f.id \
             GROUP BY f.id ORDER BY COUNT(l.user_id) DESC, f.id ASC LIMIT ?",
        )
        .bind(i64::try_from(count).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to rank films"))?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}

#[async_trait]
impl ReferenceStorage for SqliteDatabase {
    async fn get_genre(&self, id: EntityId) -> AppResult<Option<Genre>> {
        let row = sqlx::query("SELECT id, name FROM genres WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error(format!("Failed to get genre {}", id)))?;
        Ok(row.map(|row| Genre::new(row.get("id"), row.get::<String, _>("name"))))
    }

    async fn all_genres(&self) -> AppResult<Vec<Genre>> {
        let rows = sqlx::query("SELECT id, name FROM genres ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to get genres"))?;
        Ok(rows.iter().map(|row| Genre::new(row.get("id"), row.get::<String, _>("name"))).collect())
    }

    async fn get_mpa(&self, id: EntityId) -> AppResult<Option<Mpa>> {
        let row = sqlx::query("SELECT id, name FROM mpa WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error(format!("Failed to get mpa {}", id)))?;
        Ok(row.map(|row| Mpa::new(row.get("id"), row.get::<String, _>("name"))))
    }

    async fn all_mpa(&self) -> AppResult<Vec<Mpa>> {
        let rows = sqlx::query("SELECT id, name FROM mpa ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to get mpa"))?;
        Ok(rows.iter().map(|row| Mpa::new(row.get("id"), row.get::<String, _>("name"))).collect())
    }
}
