use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, LoaderTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use crate::{
    entities::{genre, language, movie},
    error::{AppError, AppResult, DbResultExt},
    models::{
        MovieDetails, MovieFilterResult, MoviePatch, MovieSort, NewMovie, average_duration,
        fold_case,
    },
};

const MOVIE_NOT_FOUND: &str = "Movie not found";
const MOVIE_EXISTS: &str = "A movie with this title already exists";
const GENRE_NOT_FOUND: &str = "Genre not found";
const GENRE_EXISTS: &str = "A genre with this name already exists";

#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
}

impl Catalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.db.ping().await.or_fail("Database unavailable")
    }

    pub async fn close(self) -> Result<(), DbErr> {
        self.db.close().await
    }

    pub async fn list_movies(&self) -> AppResult<Vec<MovieDetails>> {
        const FAILED: &str = "Failed to list movies";
        let movies = movie::Entity::find()
            .order_by_asc(movie::Column::Title)
            .all(&self.db)
            .await
            .or_fail(FAILED)?;
        self.with_relations(movies).await.or_fail(FAILED)
    }

    pub async fn get_movie(&self, id: i32) -> AppResult<MovieDetails> {
        const FAILED: &str = "Failed to load movie";
        let movie = movie::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .or_fail(FAILED)?
            .ok_or(AppError::NotFound(MOVIE_NOT_FOUND))?;
        let mut details = self.with_relations(vec![movie]).await.or_fail(FAILED)?;
        details.pop().ok_or(AppError::NotFound(MOVIE_NOT_FOUND))
    }

    /// Without a sort the rows come back in store order.
    pub async fn filter_movies(
        &self,
        language_name: Option<&str>,
        sort: Option<MovieSort>,
    ) -> AppResult<MovieFilterResult> {
        const FAILED: &str = "Failed to filter movies";
        let mut query = movie::Entity::find();

        if let Some(name) = language_name {
            let ids = self.language_ids_named(name).await.or_fail(FAILED)?;
            query = query.filter(movie::Column::LanguageId.is_in(ids));
        }

        query = match sort {
            Some(MovieSort::Title) => query.order_by_asc(movie::Column::Title),
            Some(MovieSort::ReleaseDate) => query.order_by_asc(movie::Column::ReleaseDate),
            None => query,
        };

        let movies = query.all(&self.db).await.or_fail(FAILED)?;
        let average_duration = average_duration(&movies);
        let movies = self.with_relations(movies).await.or_fail(FAILED)?;

        Ok(MovieFilterResult { total_movies: movies.len(), average_duration, movies })
    }

    pub async fn movies_by_genre(&self, genre_name: &str) -> AppResult<Vec<MovieDetails>> {
        const FAILED: &str = "Failed to list movies by genre";
        let movies = movie::Entity::find()
            .inner_join(genre::Entity)
            .filter(genre::Column::NameKey.eq(fold_case(genre_name)))
            .order_by_asc(movie::Column::Title)
            .all(&self.db)
            .await
            .or_fail(FAILED)?;
        self.with_relations(movies).await.or_fail(FAILED)
    }

    pub async fn create_movie(&self, new: NewMovie) -> AppResult<movie::Model> {
        const FAILED: &str = "Failed to create movie";
        if self.movie_titled(&new.title, None).await.or_fail(FAILED)?.is_some() {
            return Err(AppError::Conflict(MOVIE_EXISTS));
        }

        let model = movie::ActiveModel {
            id: Default::default(),
            title_key: Set(fold_case(&new.title)),
            title: Set(new.title),
            genre_id: Set(new.genre_id),
            language_id: Set(new.language_id),
            oscar_count: Set(new.oscar_count),
            release_date: Set(new.release_date.to_string()),
            duration: Set(new.duration),
        };

        let created = model
            .insert(&self.db)
            .await
            .map_err(|e| AppError::from_write(e, MOVIE_EXISTS, FAILED))?;
        debug!(id = created.id, title = %created.title, "movie created");
        Ok(created)
    }

    pub async fn update_movie(&self, id: i32, patch: MoviePatch) -> AppResult<movie::Model> {
        const FAILED: &str = "Failed to update movie";
        let existing = movie::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .or_fail(FAILED)?
            .ok_or(AppError::NotFound(MOVIE_NOT_FOUND))?;

        if let Some(title) = &patch.title {
            if self.movie_titled(title, Some(id)).await.or_fail(FAILED)?.is_some() {
                return Err(AppError::Conflict(MOVIE_EXISTS));
            }
        }

        let mut model: movie::ActiveModel = existing.clone().into();
        if let Some(title) = patch.title {
            model.title_key = Set(fold_case(&title));
            model.title = Set(title);
        }
        if let Some(genre_id) = patch.genre_id {
            model.genre_id = Set(genre_id);
        }
        if let Some(language_id) = patch.language_id {
            model.language_id = Set(language_id);
        }
        if let Some(oscar_count) = patch.oscar_count {
            model.oscar_count = Set(oscar_count);
        }
        if let Some(release_date) = patch.release_date {
            model.release_date = Set(release_date.to_string());
        }
        if let Some(duration) = patch.duration {
            model.duration = Set(Some(duration));
        }

        if !model.is_changed() {
            return Ok(existing);
        }

        let updated = model
            .update(&self.db)
            .await
            .map_err(|e| AppError::from_write(e, MOVIE_EXISTS, FAILED))?;
        debug!(id, "movie updated");
        Ok(updated)
    }

    pub async fn delete_movie(&self, id: i32) -> AppResult<()> {
        let res = movie::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .or_fail("Failed to delete movie")?;
        if res.rows_affected == 0 {
            return Err(AppError::NotFound(MOVIE_NOT_FOUND));
        }
        debug!(id, "movie deleted");
        Ok(())
    }

    pub async fn list_genres(&self) -> AppResult<Vec<genre::Model>> {
        genre::Entity::find()
            .order_by_asc(genre::Column::Name)
            .all(&self.db)
            .await
            .or_fail("Failed to list genres")
    }

    pub async fn create_genre(&self, name: String) -> AppResult<genre::Model> {
        const FAILED: &str = "Failed to create genre";
        if self.genre_named(&name, None).await.or_fail(FAILED)?.is_some() {
            return Err(AppError::Conflict(GENRE_EXISTS));
        }

        let model = genre::ActiveModel {
            id: Default::default(),
            name_key: Set(fold_case(&name)),
            name: Set(name),
        };
        let created = model
            .insert(&self.db)
            .await
            .map_err(|e| AppError::from_write(e, GENRE_EXISTS, FAILED))?;
        debug!(id = created.id, name = %created.name, "genre created");
        Ok(created)
    }

    /// Renaming a genre to a case variant of its own name is allowed.
    pub async fn update_genre(&self, id: i32, name: String) -> AppResult<genre::Model> {
        const FAILED: &str = "Failed to update genre";
        let existing = genre::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .or_fail(FAILED)?
            .ok_or(AppError::NotFound(GENRE_NOT_FOUND))?;

        if self.genre_named(&name, Some(id)).await.or_fail(FAILED)?.is_some() {
            return Err(AppError::Conflict(GENRE_EXISTS));
        }

        let mut model: genre::ActiveModel = existing.clone().into();
        model.name_key = Set(fold_case(&name));
        model.name = Set(name);
        if !model.is_changed() {
            return Ok(existing);
        }

        let updated = model
            .update(&self.db)
            .await
            .map_err(|e| AppError::from_write(e, GENRE_EXISTS, FAILED))?;
        debug!(id, name = %updated.name, "genre updated");
        Ok(updated)
    }

    pub async fn delete_genre(&self, id: i32) -> AppResult<()> {
        let res = genre::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .or_fail("Failed to delete genre")?;
        if res.rows_affected == 0 {
            return Err(AppError::NotFound(GENRE_NOT_FOUND));
        }
        debug!(id, "genre deleted");
        Ok(())
    }

    pub async fn list_languages(&self) -> AppResult<Vec<language::Model>> {
        language::Entity::find()
            .order_by_asc(language::Column::Name)
            .all(&self.db)
            .await
            .or_fail("Failed to list languages")
    }

    async fn movie_titled(
        &self,
        title: &str,
        except: Option<i32>,
    ) -> Result<Option<movie::Model>, DbErr> {
        let mut query = movie::Entity::find().filter(movie::Column::TitleKey.eq(fold_case(title)));
        if let Some(id) = except {
            query = query.filter(movie::Column::Id.ne(id));
        }
        query.one(&self.db).await
    }

    async fn genre_named(
        &self,
        name: &str,
        except: Option<i32>,
    ) -> Result<Option<genre::Model>, DbErr> {
        let mut query = genre::Entity::find().filter(genre::Column::NameKey.eq(fold_case(name)));
        if let Some(id) = except {
            query = query.filter(genre::Column::Id.ne(id));
        }
        query.one(&self.db).await
    }

    /// Languages are a small seeded table, so they are matched in memory.
    async fn language_ids_named(&self, name: &str) -> Result<Vec<i32>, DbErr> {
        let key = fold_case(name);
        let languages = language::Entity::find().all(&self.db).await?;
        Ok(languages.into_iter().filter(|l| fold_case(&l.name) == key).map(|l| l.id).collect())
    }

    async fn with_relations(&self, movies: Vec<movie::Model>) -> Result<Vec<MovieDetails>, DbErr> {
        if movies.is_empty() {
            return Ok(Vec::new());
        }
        let genres = movies.load_one(genre::Entity, &self.db).await?;
        let languages = movies.load_one(language::Entity, &self.db).await?;

        Ok(movies
            .into_iter()
            .zip(genres)
            .zip(languages)
            .map(|((movie, genre), language)| MovieDetails { movie, genre, language })
            .collect())
    }
}
