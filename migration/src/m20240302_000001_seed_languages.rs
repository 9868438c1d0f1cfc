use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const LANGUAGES: [&str; 6] =
    ["English", "Portuguese", "Spanish", "French", "Japanese", "Korean"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert.into_table(Language::Table).columns([Language::Name]);
        for name in LANGUAGES {
            insert.values_panic([name.into()]);
        }

        manager.exec_stmt(insert).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = Query::delete()
            .from_table(Language::Table)
            .and_where(Expr::col(Language::Name).is_in(LANGUAGES))
            .to_owned();

        manager.exec_stmt(delete).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Language {
    Table,
    Name,
}
