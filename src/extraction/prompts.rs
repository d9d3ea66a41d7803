// Prompt templates for the extraction service.
//
// Templates use a `{text}` / `{corpus}` placeholder rather than format!
// so the JSON braces in the schema descriptions stay literal.

const CORPUS_EXTRACTION_TEMPLATE: &str = r#"Analyze the following excerpt of an annual 10-K filing and complete two tasks.

Task 1: extract five structured dimensions.
1. foreign_investments (array)
2. global_trade (object)
3. geographic_segments (array)
4. supply_chain (object)
5. policy_impacts (array)

Task 2: extract the key passages and classify them.
- Extract every ORIGINAL, COMPLETE paragraph about investment, expansion, contraction or supply chains.
- Copy passages verbatim. Do not rewrite, summarize or shorten them.
- Each passage should be a complete paragraph of 200 to 50000 characters with its full context.
- Classify each passage:
  * expansion: expansion, investment, growth, entering new markets
  * contraction: contraction, divestment, cutbacks, exiting markets
  * neutral: neutral description of the current state

Return JSON in exactly this shape:
{
  "structured_data": {
    "foreign_investments": [
      {
        "investment_type": "type (acquisition, greenfield, joint venture...)",
        "target_country": "country",
        "target_region": "region",
        "investment_amount": number in millions of USD or null,
        "investment_amount_original": "amount as written, with units",
        "investment_purpose": "purpose",
        "description": "description"
      }
    ],
    "global_trade": {
      "total_revenue": number in millions of USD or null,
      "total_revenue_original": "as written",
      "international_revenue": number in millions of USD or null,
      "international_revenue_original": "as written",
      "international_revenue_pct": percentage as a number,
      "major_markets": ["market 1", "market 2"]
    },
    "geographic_segments": [
      {
        "region": "region",
        "country": "country",
        "revenue": number in millions of USD or null,
        "revenue_original": "as written",
        "revenue_pct": percentage as a number
      }
    ],
    "supply_chain": {
      "supplier_countries": ["country 1"],
      "manufacturing_locations": ["location 1"],
      "distribution_centers": ["center 1"],
      "sourcing_strategy": "strategy",
      "risk_factors": "risk factors"
    },
    "policy_impacts": [
      {
        "policy_type": "trade policy, tariffs, sanctions...",
        "policy_description": "description",
        "impact_description": "impact on the company",
        "mentioned_countries": ["country 1"],
        "decoupling_indicators": "yes/no/unclear and supporting description"
      }
    ]
  },
  "text_segments": [
    {
      "text": "verbatim paragraph from the filing",
      "category": "expansion/contraction/neutral",
      "type": "investment/trade/supply_chain/policy",
      "source_section": "Item 1/Item 7/etc"
    }
  ]
}

Requirements:
1. "text" must be the original paragraph, never a rewrite or summary.
2. Prefer passages with concrete figures, country names, investment amounts and expansion plans.
3. Aim for 15 to 30 passages.
4. Convert every amount to millions of USD ("5 billion" -> 5000, "$120 million" -> 120, "500 thousand" -> 0.5) and keep the original wording in the *_original field. Use null when no amount is stated. Percentages are plain numbers ("35%" -> 35).

Filing text:
{text}
"#;

const KEYWORD_EXTRACTION_TEMPLATE: &str = r#"Analyze the following passages from annual filings and extract keywords and phrases.

Requirements:
1. Identify every word or phrase that signals investment, expansion, contraction or geographic shifts.
2. Do not restrict yourself to a fixed vocabulary; use the meaning of the text.
3. Extract single words, phrases and technical terms.

Categories:
- expansion: expansion, investment, growth (expand, new facility, capacity increase, market entry)
- contraction: contraction, divestment, cutbacks (exit, closure, divest, reduce capacity, layoff)
- china_positive: positive statements about the China market (invest in china, growth in china)
- china_negative: negative statements about China or signs of decoupling (reduce dependence on china, diversify from china, exit china)
- non_china_regions: investment in regions other than China (vietnam expansion, india manufacturing, mexico facility, nearshoring)

Passages:
{corpus}

Return JSON:
{
  "keywords": [
    {
      "keyword": "keyword or phrase",
      "category": "expansion/contraction/china_positive/china_negative/non_china_regions",
      "context": "example of the surrounding text"
    }
  ]
}
"#;

const TICKER_LOOKUP_TEMPLATE: &str = r#"Given the following company information, provide its stock ticker symbol.

Company Name: {company}
CIK: {cik}

Requirements:
1. Answer with the exchange ticker only (for example "AAPL", "GOOGL", "MSFT").
2. If you cannot determine the ticker with high confidence, answer "UNKNOWN".

Return JSON: {"ticker": "SYMBOL"}
"#;

/// The corpus extraction prompt with the filing text embedded.
pub fn corpus_extraction(text: &str) -> String {
    CORPUS_EXTRACTION_TEMPLATE.replace("{text}", text)
}

/// The keyword mining prompt for a batch of passages.
pub fn keyword_extraction(corpus: &str) -> String {
    KEYWORD_EXTRACTION_TEMPLATE.replace("{corpus}", corpus)
}

/// The ticker lookup prompt.
pub fn ticker_lookup(company_name: &str, cik: &str) -> String {
    TICKER_LOOKUP_TEMPLATE
        .replace("{company}", company_name)
        .replace("{cik}", cik)
}
