//! Prompt synthesis: render an entity, a directive and its [`MatchContext`]
//! into the directive document sent to the narrative generator.
//!
//! Rendering is pure. Every conditional block appears only when the context
//! field backing it is present, and the document always ends with the fixed
//! eight-section output contract from [`crate::template`].

use bizintel_shared::{
    CampaignRecord, CustomerRecord, MatchContext, OfferingRecord, PlaybookRecord, UNKNOWN,
};

use crate::template::{Horizon, Section};

/// Placeholder for reference fields the record store left empty.
const NOT_AVAILABLE: &str = "N/A";

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(NOT_AVAILABLE)
}

fn number_or_na(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Render the full directive document.
pub fn render_prompt(entity: &str, directive: &str, ctx: &MatchContext) -> String {
    let mut out = String::new();
    out.push_str(
        "You are a world-class business intelligence analyst with access to internal company data.\n\n",
    );
    out.push_str(&format!("COMPANY TO ANALYZE: {entity}\n"));
    out.push_str(&format!("ANALYSIS DIRECTIVE: {directive}\n\n"));

    if let Some(customer) = ctx.entity_record() {
        out.push_str(&customer_banner(customer));
    }

    out.push_str("=== INTERNAL DATA FROM YOUR COMPANY SYSTEMS ===\n");
    out.push_str(&offerings_block(&ctx.relevant_offerings));
    out.push_str(&campaigns_block(&ctx.relevant_campaigns));
    out.push_str(&playbooks_block(&ctx.relevant_playbooks));
    out.push_str("===================================================\n\n");

    out.push_str(INSTRUCTIONS);
    out.push_str(&response_format(ctx));
    out
}

// ---------------------------------------------------------------------------
// Context blocks
// ---------------------------------------------------------------------------

fn customer_banner(customer: &CustomerRecord) -> String {
    let mut out = format!("**EXISTING CUSTOMER FOUND: {}**\n", customer.company_name);
    out.push_str(&format!("- Industry: {}\n", or_na(customer.industry.as_deref())));
    out.push_str(&format!(
        "- Account Manager: {}\n",
        or_na(customer.account_manager.as_deref())
    ));
    out.push_str(&format!(
        "- Relationship Status: {}\n",
        or_na(customer.relationship_status.as_deref())
    ));
    out.push_str(&format!(
        "- Last Interaction: {}\n",
        or_na(customer.last_interaction_date.as_deref())
    ));
    out.push_str(&format!(
        "- Annual Revenue: {}\n",
        or_na(customer.annual_revenue.as_deref())
    ));
    out.push_str(&format!(
        "- Employee Count: {}\n",
        or_na(customer.employee_count.as_deref())
    ));
    out.push_str(&format!(
        "- Headquarters: {}\n",
        or_na(customer.headquarters_location.as_deref())
    ));
    if let Some(auditor) = auditor_firm(customer) {
        out.push_str(&format!("- **Auditor Firm**: {auditor}\n"));
    }
    out.push_str(
        "\n**CRITICAL: This is an EXISTING CUSTOMER. Your analysis must reflect this relationship.**\n",
    );
    if let Some(auditor) = auditor_firm(customer) {
        out.push_str(&format!(
            "**AUDITOR STATUS: Our records show their auditor is \"{auditor}\". Use this in your \
             Auditor Status field. Do NOT say \"Unknown\" if we have this information.**\n"
        ));
    }
    out.push('\n');
    out
}

fn auditor_firm(customer: &CustomerRecord) -> Option<&str> {
    customer
        .auditor_firm
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
}

fn offerings_block(offerings: &[OfferingRecord]) -> String {
    if offerings.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n**RELEVANT PRODUCTS FROM OUR CATALOG:**\n");
    for (idx, p) in offerings.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. **{}** ({})\n",
            idx + 1,
            p.product_name,
            or_na(p.product_category.as_deref())
        ));
        out.push_str(&format!(
            "   - Target Industries: {}\n",
            or_na(p.target_industries.as_deref())
        ));
        out.push_str(&format!("   - Key Features: {}\n", or_na(p.features.as_deref())));
        out.push_str(&format!(
            "   - Competitive Advantage: {}\n",
            or_na(p.competitive_advantage.as_deref())
        ));
        out.push_str(&format!("   - Pricing Tier: {}\n", or_na(p.base_price.as_deref())));
    }
    out
}

fn campaigns_block(campaigns: &[CampaignRecord]) -> String {
    if campaigns.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n**RELEVANT MARKETING CAMPAIGNS:**\n");
    for (idx, c) in campaigns.iter().enumerate() {
        out.push_str(&format!("\n{}. **{}**\n", idx + 1, c.campaign_name));
        out.push_str(&format!(
            "   - Target Industry: {}\n",
            or_na(c.target_industry.as_deref())
        ));
        out.push_str(&format!(
            "   - Budget Allocated: {}\n",
            number_or_na(c.budget_allocated)
        ));
        let rate = c
            .conversion_rate
            .map_or_else(|| NOT_AVAILABLE.to_string(), |r| format!("{r}%"));
        out.push_str(&format!("   - Conversion Rate: {rate}\n"));
        out.push_str(&format!("   - End Date: {}\n", or_na(c.end_date.as_deref())));
    }
    out
}

fn playbooks_block(playbooks: &[PlaybookRecord]) -> String {
    if playbooks.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n**RELEVANT SALES PLAYS:**\n");
    for (idx, p) in playbooks.iter().enumerate() {
        out.push_str(&format!("\n{}. **{}**\n", idx + 1, p.play_name));
        out.push_str(&format!(
            "   - Target Persona: {}\n",
            or_na(p.target_persona.as_deref())
        ));
        out.push_str(&format!(
            "   - Target Industry: {}\n",
            or_na(p.target_industry.as_deref())
        ));
        out.push_str(&format!(
            "   - Value Proposition: {}\n",
            or_na(p.value_proposition.as_deref())
        ));
        out.push_str(&format!(
            "   - Engagement Strategy: {}\n",
            or_na(p.engagement_strategy.as_deref())
        ));
        out.push_str(&format!(
            "   - Success Metrics: {}\n",
            or_na(p.success_metrics.as_deref())
        ));
        out.push_str(&format!(
            "   - Recommended Products: {}\n",
            or_na(p.recommended_products.as_deref())
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// Instructions and output contract
// ---------------------------------------------------------------------------

const INSTRUCTIONS: &str = "\
**CRITICAL INSTRUCTIONS FOR USING INTERNAL DATA:**

1. **CUSTOMER DATA PRIORITY:**
   - If this is an existing customer, emphasize the relationship throughout your analysis
   - Reference account manager, relationship status, and last interaction date in relevant sections
   - Consider annual revenue and employee count when scoring

2. **PRODUCT RECOMMENDATIONS:**
   - Recommend specific products from our catalog section when it is present
   - Match products to customer needs based on target industries and features
   - Explain why each product's competitive advantage fits this customer

3. **CAMPAIGN INSIGHTS:**
   - Incorporate conversion rates from relevant campaigns into your prospect scoring
   - If a campaign targets this customer's industry, mention it as a proven approach

4. **SALES PLAY INTEGRATION:**
   - Identify which sales play(s) above are most relevant
   - Use the value proposition from the sales play in your win themes
   - Reference success metrics when discussing potential outcomes

5. **SCORING REQUIREMENTS:**
   - Factor in campaign conversion rates when calculating the prospect score
   - Give higher scores if we have relevant products with strong competitive advantages
   - If high-performing campaigns exist for this industry, boost the market readiness score

6. **EXTERNAL RESEARCH:**
   - Use publicly available company information you know
   - DO NOT make up numbers. If data is unavailable, state \"Unknown - needs manual research\"
   - Clearly distinguish between INTERNAL DATA and PUBLIC INFORMATION

**RESPONSE FORMAT - USE THESE EXACT HEADERS:**

";

fn response_format(ctx: &MatchContext) -> String {
    let customer = ctx.entity_record();
    let top_campaign = ctx.relevant_campaigns.first();
    let top_play = ctx.relevant_playbooks.first();
    let mut out = String::new();

    // 1. Company overview
    out.push_str(&format!("{}\n", Section::CompanyOverview.header()));
    out.push_str("- Company: [Full legal name]\n");
    out.push_str("- Industry: [Primary industry]\n");
    out.push_str("- Location: [Headquarters city, state/country]\n");
    out.push_str(&format!("- Employees: [Employee count or \"{UNKNOWN}\"]\n"));
    out.push_str(&format!("- Founded: [Year or \"{UNKNOWN}\"]\n"));
    out.push_str(&format!("- Status: [Public/Private or \"{UNKNOWN}\"]\n"));
    out.push_str("- Description: [2-3 sentences]\n");
    out.push_str("- Key Products/Services: [List 3-5]\n");
    if let Some(c) = customer {
        out.push_str(&format!(
            "- **Relationship Status**: {}\n",
            or_na(c.relationship_status.as_deref())
        ));
        out.push_str(&format!(
            "- **Account Manager**: {}\n",
            or_na(c.account_manager.as_deref())
        ));
        out.push_str(&format!(
            "- **Last Interaction Date**: {}\n",
            or_na(c.last_interaction_date.as_deref())
        ));
    }

    // 2. Financial health
    out.push_str(&format!("\n{}\n", Section::FinancialHealth.header()));
    out.push_str(&format!(
        "- Revenue: [Most recent annual revenue or \"{UNKNOWN}\"]\n"
    ));
    out.push_str(&format!("- Growth Rate: [YoY growth or \"{UNKNOWN}\"]\n"));
    out.push_str(&format!("- Operating Income: [Amount or \"{UNKNOWN}\"]\n"));
    out.push_str(&format!(
        "- Market Cap: [For public companies or \"{UNKNOWN}\"]\n"
    ));
    out.push_str(&format!("- Cash Position: [Amount or \"{UNKNOWN}\"]\n"));
    out.push_str("- Financial Stability: [Assessment]\n");

    // 3. Prospect analysis
    out.push_str(&format!("\n{}\n\n", Section::ProspectAnalysis.header()));
    out.push_str("**Prospect Level:** High/Medium/Low\n");
    out.push_str("**Prospect Score:** [0-100 numeric value]\n\n");
    out.push_str("**Scoring Breakdown:**\n");
    if customer.is_some() {
        out.push_str("- Strategic Fit: [score]/30 (+5 bonus: existing customer)\n");
    } else {
        out.push_str("- Strategic Fit: [score]/30\n");
    }
    match top_campaign.and_then(|c| c.conversion_rate) {
        Some(rate) => out.push_str(&format!(
            "- Market Readiness: [score]/25 (Influenced by {rate}% campaign conversion rate)\n"
        )),
        None => out.push_str("- Market Readiness: [score]/25\n"),
    }
    out.push_str("- Financial Capacity: [score]/20\n");
    out.push_str("- Competitive Position: [score]/15\n");
    out.push_str("- Urgency/Timing: [score]/10\n\n");
    out.push_str("**Scoring Rationale:**\n");
    out.push_str("[Explain how internal data influenced the score: campaign conversion rates, product-market fit based on our catalog, an existing relationship, sales play alignment]\n\n");
    match customer.and_then(auditor_firm) {
        Some(auditor) => out.push_str(&format!(
            "**Auditor Status:** ✓ {auditor} (from our customer records - DO NOT change this)\n"
        )),
        None => out.push_str(&format!(
            "**Auditor Status:** [Based on public information or \"{UNKNOWN}\"]\n"
        )),
    }

    // 4. Win themes
    out.push_str(&format!("\n{}\n\n", Section::WinThemes.header()));
    out.push_str("**Identify 3-5 compelling win themes based on INTERNAL DATA:**\n\n");
    if let Some(play) = top_play {
        out.push_str(&format!("**Recommended Sales Play**: {}\n", play.play_name));
        out.push_str(&format!(
            "**Value Proposition**: {}\n\n",
            or_na(play.value_proposition.as_deref())
        ));
    }
    out.push_str("1. [Win Theme 1 - Must reference relevant products or campaigns]\n");
    out.push_str("2. [Win Theme 2 - Must reference competitive advantages from product catalog]\n");
    out.push_str("3. [Win Theme 3 - Must tie to successful campaign data if available]\n");
    out.push_str("4. [Additional themes as relevant]\n");

    // 5. Recommended solutions
    out.push_str(&format!("\n{}\n\n", Section::RecommendedSolutions.header()));
    out.push_str("**Products from Our Catalog:**\n\n");
    if ctx.relevant_offerings.is_empty() {
        out.push_str("Recommend products based on customer needs:\n\n");
    } else {
        out.push_str("Based on the analysis, recommend products from our catalog, explaining:\n\n");
    }
    out.push_str("1. **[Product Name]**\n");
    out.push_str("   - **Why It Fits:** [Match between the prospect's needs and this product]\n");
    out.push_str("   - **Key Differentiators:** [The product's competitive advantage]\n");
    out.push_str("   - **Estimated Implementation Timeline:** [Realistic estimate]\n");
    out.push_str("   - **Estimated Value Proposition:** [Expected value or ROI given the prospect's size]\n\n");
    out.push_str("[Repeat for each recommended product]\n");

    // 6. Key personnel
    out.push_str(&format!("\n{}\n", Section::KeyPersonnel.header()));
    out.push_str("[Identify key decision-makers from public information.]\n\n");
    out.push_str("- **Executive Sponsor (CEO/C-Suite):** [Name and Title]\n");
    match top_play.and_then(|p| p.target_persona.as_deref()) {
        Some(persona) => out.push_str(&format!(
            "- **Primary Decision Maker (e.g., a {persona}):** [Name and Title]\n"
        )),
        None => out.push_str(
            "- **Primary Decision Maker (e.g., VP of Operations):** [Name and Title]\n",
        ),
    }
    out.push_str("- **Key Influencers/Department Heads:** [Name and Title]\n");

    // 7. Engagement strategy
    out.push_str(&format!("\n{}\n\n", Section::EngagementStrategy.header()));
    out.push_str(&format!(
        "**Based on Sales Play: {}**\n\n",
        top_play.map_or("Standard Enterprise", |p| p.play_name.as_str())
    ));
    out.push_str("**Recommended Approach:**\n");
    if let Some(play) = top_play {
        out.push_str(&format!(
            "- Target Persona: {}\n",
            or_na(play.target_persona.as_deref())
        ));
        out.push_str(&format!(
            "- Engagement Strategy: {}\n",
            or_na(play.engagement_strategy.as_deref())
        ));
        out.push_str(&format!(
            "- Expected Product Fit: {}\n",
            or_na(play.recommended_products.as_deref())
        ));
    }
    out.push_str("\n**Campaign Alignment:**\n");
    match top_campaign {
        Some(c) => out.push_str(&format!(
            "- Align with our internal '{}' campaign where relevant.\n",
            c.campaign_name
        )),
        None => out.push_str("- No specific internal campaign to align with.\n"),
    }
    out.push_str("- **Generated Key Message:** [Concise message for the target persona]\n");
    out.push_str("- **Suggested Channels:** [2-3 marketing and sales channels]\n");

    // 8. Go-to-market plan
    out.push_str(&format!("\n{}\n", Section::GoToMarket.header()));
    for horizon in Horizon::ALL {
        out.push_str(&format!("\n{}\n", horizon.header()));
        out.push_str("1. [Action]\n2. [Action]\n3. [Action]\n");
    }
    match top_play {
        Some(play) => {
            out.push_str(&format!(
                "\n**Success Metrics** (from {} playbook):\n",
                play.play_name
            ));
            out.push_str(&format!(
                "- {}\n",
                or_na(play.success_metrics.as_deref())
            ));
        }
        None => out.push_str("\n**Success Metrics:**\n- [Define specific KPIs]\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::store::MemoryStore;

    fn customer() -> CustomerRecord {
        CustomerRecord {
            company_name: "Acme Corp".into(),
            industry: Some("Manufacturing".into()),
            account_manager: Some("Dana Lee".into()),
            relationship_status: Some("Active".into()),
            last_interaction_date: Some("2024-03-01".into()),
            auditor_firm: Some("KPMG".into()),
            annual_revenue: Some("$2B".into()),
            employee_count: Some("1200".into()),
            headquarters_location: Some("Austin, TX".into()),
        }
    }

    fn playbook() -> PlaybookRecord {
        PlaybookRecord {
            play_name: "Plant Modernization".into(),
            target_persona: Some("VP of Manufacturing".into()),
            target_industry: Some("Manufacturing".into()),
            value_proposition: Some("Cut downtime by 30%".into()),
            engagement_strategy: Some("Executive briefing".into()),
            success_metrics: Some("Pilot signed in 60 days".into()),
            recommended_products: Some("Shop Floor IoT".into()),
        }
    }

    fn campaign() -> CampaignRecord {
        CampaignRecord {
            campaign_name: "Factory Week".into(),
            target_industry: Some("Manufacturing".into()),
            budget_allocated: Some(250000.0),
            conversion_rate: Some(4.5),
            end_date: None,
        }
    }

    #[test]
    fn matched_context_renders_banner_and_auditor() {
        let mut ctx = MatchContext::matched(customer());
        ctx.relevant_campaigns.push(campaign());
        ctx.relevant_playbooks.push(playbook());
        let prompt = render_prompt("acme corp", "Upsell analytics", &ctx);

        assert!(prompt.contains("**EXISTING CUSTOMER FOUND: Acme Corp**"));
        assert!(prompt.contains("Our records show their auditor is \"KPMG\""));
        assert!(prompt.contains("**Auditor Status:** ✓ KPMG (from our customer records"));
        assert!(prompt.contains("(Influenced by 4.5% campaign conversion rate)"));
        assert!(prompt.contains("**Based on Sales Play: Plant Modernization**"));
        assert!(prompt.contains("(e.g., a VP of Manufacturing)"));
        assert!(prompt.contains("- Account Manager: Dana Lee"));
        assert!(prompt.contains("- End Date: N/A"));
    }

    #[test]
    fn unmatched_context_omits_conditional_blocks() {
        let prompt = render_prompt("Wayne Enterprises", "New logo", &MatchContext::empty());

        assert!(!prompt.contains("EXISTING CUSTOMER"));
        assert!(!prompt.contains("AUDITOR STATUS"));
        assert!(!prompt.contains("RELEVANT PRODUCTS"));
        assert!(!prompt.contains("RELEVANT MARKETING CAMPAIGNS"));
        assert!(!prompt.contains("RELEVANT SALES PLAYS"));
        assert!(!prompt.contains("Relationship Status**"));
        assert!(!prompt.contains("Influenced by"));
        assert!(!prompt.contains("+5 bonus"));
        assert!(!prompt.contains("{"));
        assert!(prompt.contains("**Based on Sales Play: Standard Enterprise**"));
        assert!(prompt.contains("- No specific internal campaign to align with."));
    }

    #[tokio::test]
    async fn aggregated_context_controls_the_customer_banner() {
        let mut umbrella = customer();
        umbrella.company_name = "Umbrella Holdings".into();
        umbrella.account_manager = Some("Sam Ortiz".into());
        let store = MemoryStore::new().with_customers(vec![customer(), umbrella]);

        let ctx = aggregate("ACME CORP", &store).await;
        assert_eq!(ctx.matched_entity_name(), Some("Acme Corp"));
        let prompt = render_prompt("ACME CORP", "Upsell analytics", &ctx);
        assert!(prompt.contains("**EXISTING CUSTOMER FOUND: Acme Corp**"));

        let ctx = aggregate("Wayne Enterprises", &store).await;
        assert!(ctx.entity_record().is_none());
        let prompt = render_prompt("Wayne Enterprises", "New logo", &ctx);
        assert!(prompt.contains("COMPANY TO ANALYZE: Wayne Enterprises"));
        assert!(!prompt.contains("EXISTING CUSTOMER"));
        assert!(!prompt.contains("- Account Manager:"));
        assert!(!prompt.contains("Dana Lee"));
        assert!(!prompt.contains("Sam Ortiz"));
        assert!(!prompt.contains("AUDITOR STATUS"));
        assert!(prompt.contains("ANALYSIS DIRECTIVE: New logo\n\n=== INTERNAL DATA"));
    }

    #[test]
    fn customer_without_auditor_gets_placeholder_status() {
        let mut c = customer();
        c.auditor_firm = Some("  ".into());
        let prompt = render_prompt("Acme", "x", &MatchContext::matched(c));
        assert!(prompt.contains("EXISTING CUSTOMER FOUND"));
        assert!(!prompt.contains("Our records show their auditor"));
        assert!(prompt.contains("**Auditor Status:** [Based on public information"));
    }

    #[test]
    fn contract_lists_every_section_in_order() {
        let prompt = render_prompt("X", "y", &MatchContext::empty());
        let mut last = 0;
        for section in Section::ALL {
            let pos = prompt.find(&section.header()).expect("section header present");
            assert!(pos > last);
            last = pos;
        }
        for horizon in Horizon::ALL {
            assert!(prompt.contains(&horizon.header()));
        }
        assert!(prompt.contains(UNKNOWN));
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut ctx = MatchContext::matched(customer());
        ctx.relevant_playbooks.push(playbook());
        assert_eq!(
            render_prompt("Acme", "d", &ctx),
            render_prompt("Acme", "d", &ctx)
        );
    }
}
