use derive_new::new;
use snafu::{Location, ResultExt as _, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::Surreal;

pub type Database = Surreal<Any>;

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("cannot connect to the database `{url}` at {location}: {source}"))]
    DatabaseConnection {
        url: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot sign in to the database `{url}` as `{username}` at {location}: {source}"))]
    DatabaseSignin {
        url: String,
        username: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot select namespace `{namespace}` and database `{database}` at {location}: {source}"))]
    DatabaseSelect {
        namespace: String,
        database: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Where the count tables live. `mem://` runs an embedded instance inside the process.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub credentials: Option<Credentials>,
}

#[derive(Clone, PartialEq, Eq, new)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    fn auth(&self) -> auth::Root<'_> {
        auth::Root {
            username: &self.username,
            password: &self.password,
        }
    }
}

pub async fn connect(config: &DatabaseConfig) -> Result<Database> {
    let db = surrealdb::engine::any::connect(config.url.as_str())
        .await
        .context(DatabaseConnectionSnafu {
            url: &config.url,
        })?;

    if let Some(credentials) = &config.credentials {
        db.signin(credentials.auth())
            .await
            .context(DatabaseSigninSnafu {
                url: &config.url,
                username: &credentials.username,
            })?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .context(DatabaseSelectSnafu {
            namespace: &config.namespace,
            database: &config.database,
        })?;

    tracing::info!(url = %config.url, namespace = %config.namespace, database = %config.database, "connected to the database");

    Ok(db)
}
